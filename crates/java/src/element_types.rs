//! Java stub element types.
//!
//! Registration order is fixed by [`JavaKind`]; it decides the persisted ids.

use std::sync::Arc;
use stub_core::{
    ElementTypeId, ElementTypeRegistry, IndexSink, LightNodeId, LightTreeWalker,
    MaterializeContext, PsiNode, Result, StubElementType, StubFields, StubIndexKey,
    StubInputStream, StubOutputStream, StubRef, SyntaxKind,
};

pub const CLASS_SHORT_NAME_INDEX: StubIndexKey = StubIndexKey::new("java.class.shortName");
pub const METHOD_NAME_INDEX: StubIndexKey = StubIndexKey::new("java.method.name");
pub const FIELD_NAME_INDEX: StubIndexKey = StubIndexKey::new("java.field.name");
pub const MODULE_NAME_INDEX: StubIndexKey = StubIndexKey::new("java.module.name");
pub const SERVICE_USES_INDEX: StubIndexKey = StubIndexKey::new("java.module.uses");
pub const SERVICE_PROVIDES_INDEX: StubIndexKey = StubIndexKey::new("java.module.provides");

/// Every index the Java element types write to.
pub const ALL_INDEXES: [StubIndexKey; 6] = [
    CLASS_SHORT_NAME_INDEX,
    METHOD_NAME_INDEX,
    FIELD_NAME_INDEX,
    MODULE_NAME_INDEX,
    SERVICE_USES_INDEX,
    SERVICE_PROVIDES_INDEX,
];

/// Javaの要素型（並び順 = 登録順 = 永続化されるID）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum JavaKind {
    File,
    Class,
    TypeParameterList,
    TypeParameter,
    Method,
    Field,
    Module,
    Requires,
    Uses,
    Provides,
}

impl JavaKind {
    pub const ALL: [JavaKind; 10] = [
        JavaKind::File,
        JavaKind::Class,
        JavaKind::TypeParameterList,
        JavaKind::TypeParameter,
        JavaKind::Method,
        JavaKind::Field,
        JavaKind::Module,
        JavaKind::Requires,
        JavaKind::Uses,
        JavaKind::Provides,
    ];

    pub const fn id(self) -> ElementTypeId {
        ElementTypeId::new(self as u16)
    }

    pub fn of(stub: StubRef<'_>) -> Option<JavaKind> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.id() == stub.element_type())
    }

    fn element_type(self) -> Arc<dyn StubElementType> {
        match self {
            JavaKind::File => Arc::new(FileType),
            JavaKind::Class => Arc::new(ClassType),
            JavaKind::TypeParameterList => Arc::new(TypeParameterListType),
            JavaKind::TypeParameter => Arc::new(TypeParameterType),
            JavaKind::Method => Arc::new(MethodType),
            JavaKind::Field => Arc::new(FieldType),
            JavaKind::Module => Arc::new(ModuleType),
            JavaKind::Requires => Arc::new(RequiresType),
            JavaKind::Uses => Arc::new(UsesType),
            JavaKind::Provides => Arc::new(ProvidesType),
        }
    }
}

/// Syntax kinds without a stub whose children may still hold declarations.
pub const TRANSPARENT_KINDS: &[SyntaxKind] = &[
    "class_body",
    "interface_body",
    "enum_body",
    "enum_body_declarations",
    "annotation_type_body",
    "module_body",
    "block",
    "constructor_body",
];

/// Javaの要素型をすべて登録したレジストリを作成
pub fn java_registry() -> Result<Arc<ElementTypeRegistry>> {
    let mut registry = ElementTypeRegistry::new();
    for kind in JavaKind::ALL {
        let id = registry.register(kind.element_type())?;
        debug_assert_eq!(id, kind.id());
    }
    for &kind in TRANSPARENT_KINDS {
        registry.mark_transparent(kind)?;
    }
    Ok(registry.freeze())
}

/// Modifier and kind bits shared by classes, methods and fields.
pub mod flags {
    pub const INTERFACE: u32 = 1 << 0;
    pub const ENUM: u32 = 1 << 1;
    pub const RECORD: u32 = 1 << 2;
    pub const ANNOTATION: u32 = 1 << 3;
    pub const PUBLIC: u32 = 1 << 4;
    pub const PROTECTED: u32 = 1 << 5;
    pub const PRIVATE: u32 = 1 << 6;
    pub const STATIC: u32 = 1 << 7;
    pub const ABSTRACT: u32 = 1 << 8;
    pub const FINAL: u32 = 1 << 9;
    pub const CONSTRUCTOR: u32 = 1 << 10;
    pub const ENUM_CONSTANT: u32 = 1 << 11;
    pub const DEFAULT: u32 = 1 << 12;

    pub const TRANSITIVE: u32 = 1 << 0;
    pub const STATIC_PHASE: u32 = 1 << 1;
    pub const OPEN: u32 = 1 << 0;
}

const NAME_KINDS: &[SyntaxKind] = &["scoped_identifier", "identifier"];

fn modifier_flags(walker: &LightTreeWalker<'_>, node: LightNodeId) -> u32 {
    let Some(modifiers) = walker.first_child_of_kind(node, "modifiers") else {
        return 0;
    };
    walker
        .children(modifiers)
        .iter()
        .map(|&child| match walker.kind(child) {
            "public" => flags::PUBLIC,
            "protected" => flags::PROTECTED,
            "private" => flags::PRIVATE,
            "static" => flags::STATIC,
            "abstract" => flags::ABSTRACT,
            "final" => flags::FINAL,
            "default" => flags::DEFAULT,
            _ => 0,
        })
        .fold(0, |acc, bit| acc | bit)
}

/// `identifier` / `scoped_identifier` children in order, whitespace removed.
fn qualified_names(walker: &LightTreeWalker<'_>, node: LightNodeId) -> Vec<Arc<str>> {
    walker
        .children(node)
        .iter()
        .copied()
        .filter(|&child| NAME_KINDS.contains(&walker.kind(child)))
        .map(|child| walker.interned_compact_text(child))
        .collect()
}

struct FileType;

impl StubElementType for FileType {
    fn external_id(&self) -> &'static str {
        "java.FILE"
    }

    fn syntax_kinds(&self) -> &'static [SyntaxKind] {
        &["program"]
    }

    fn create_stub(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        let package = walker
            .first_child_of_kind(node, "package_declaration")
            .and_then(|decl| walker.first_child_of_any(decl, NAME_KINDS))
            .map(|name| walker.interned_compact_text(name));
        Ok(StubFields::new().with_name(package))
    }

    fn serialize(&self, stub: StubRef<'_>, out: &mut StubOutputStream) -> Result<()> {
        out.write_name(stub.name());
        Ok(())
    }

    fn deserialize(
        &self,
        input: &mut StubInputStream<'_>,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        Ok(StubFields::new().with_name(input.read_name()?))
    }

    fn create_psi(&self, ctx: &MaterializeContext<'_>) -> Result<PsiNode> {
        let node = PsiNode::from_context(ctx);
        Ok(match ctx.stub().name() {
            Some(package) => node.with_property("package", package.to_string()),
            None => node,
        })
    }
}

/// Fields: `[name, qualified name, flags]`.
struct ClassType;

impl ClassType {
    fn kind_flag(kind: SyntaxKind) -> u32 {
        match kind {
            "interface_declaration" => flags::INTERFACE,
            "enum_declaration" => flags::ENUM,
            "record_declaration" => flags::RECORD,
            "annotation_type_declaration" => flags::ANNOTATION | flags::INTERFACE,
            _ => 0,
        }
    }

    /// Local classes (inside a method) have no qualified name.
    fn qualified_name(name: &Arc<str>, parent: Option<StubRef<'_>>) -> Option<String> {
        let Some(parent) = parent else {
            return Some(name.to_string());
        };
        match JavaKind::of(parent) {
            Some(JavaKind::File) => Some(match parent.name() {
                Some(package) => format!("{}.{}", package, name),
                None => name.to_string(),
            }),
            Some(JavaKind::Class) => parent
                .fields()
                .name(1)
                .map(|outer| format!("{}.{}", outer, name)),
            _ => None,
        }
    }

    fn describe(flags: u32) -> &'static str {
        if flags & flags::ANNOTATION != 0 {
            "annotation"
        } else if flags & flags::INTERFACE != 0 {
            "interface"
        } else if flags & flags::ENUM != 0 {
            "enum"
        } else if flags & flags::RECORD != 0 {
            "record"
        } else {
            "class"
        }
    }
}

impl StubElementType for ClassType {
    fn external_id(&self) -> &'static str {
        "java.CLASS"
    }

    fn syntax_kinds(&self) -> &'static [SyntaxKind] {
        &[
            "class_declaration",
            "interface_declaration",
            "enum_declaration",
            "record_declaration",
            "annotation_type_declaration",
        ]
    }

    fn create_stub(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        let id = walker.required_child_of_kind(node, "identifier")?;
        let name = walker.interned_text(id);
        let qualified = Self::qualified_name(&name, parent).map(|q| Arc::<str>::from(q.as_str()));
        let flags = Self::kind_flag(walker.kind(node)) | modifier_flags(walker, node);
        Ok(StubFields::new()
            .with_name(Some(name))
            .with_name(qualified)
            .with_flags(flags))
    }

    fn serialize(&self, stub: StubRef<'_>, out: &mut StubOutputStream) -> Result<()> {
        let fields = stub.fields();
        out.write_name(fields.name(0));
        out.write_name(fields.name(1));
        out.write_flags(fields.flags(2));
        Ok(())
    }

    fn deserialize(
        &self,
        input: &mut StubInputStream<'_>,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        let name = input.read_name_string()?;
        let qualified = input.read_name()?;
        let flags = input.read_flags()?;
        Ok(StubFields::new()
            .with_name(Some(name))
            .with_name(qualified)
            .with_flags(flags))
    }

    fn index_stub(&self, stub: StubRef<'_>, sink: &mut dyn IndexSink) {
        if let Some(name) = stub.name() {
            sink.occurrence(CLASS_SHORT_NAME_INDEX, name);
        }
    }

    fn create_psi(&self, ctx: &MaterializeContext<'_>) -> Result<PsiNode> {
        let fields = ctx.stub().fields();
        let mut node = PsiNode::from_context(ctx).with_property("kind", Self::describe(fields.flags(2)));
        if let Some(qualified) = fields.name(1) {
            node = node.with_property("qualifiedName", qualified.to_string());
        }
        Ok(node)
    }
}

struct TypeParameterListType;

impl StubElementType for TypeParameterListType {
    fn external_id(&self) -> &'static str {
        "java.TYPE_PARAMETER_LIST"
    }

    fn syntax_kinds(&self) -> &'static [SyntaxKind] {
        &["type_parameters"]
    }

    fn create_stub(
        &self,
        _walker: &LightTreeWalker<'_>,
        _node: LightNodeId,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        Ok(StubFields::new())
    }

    fn serialize(&self, _stub: StubRef<'_>, _out: &mut StubOutputStream) -> Result<()> {
        Ok(())
    }

    fn deserialize(
        &self,
        _input: &mut StubInputStream<'_>,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        Ok(StubFields::new())
    }
}

/// 型パラメータ。名前だけを持ち、インデックスには載らない。
struct TypeParameterType;

impl StubElementType for TypeParameterType {
    fn external_id(&self) -> &'static str {
        "java.TYPE_PARAMETER"
    }

    fn syntax_kinds(&self) -> &'static [SyntaxKind] {
        &["type_parameter"]
    }

    fn create_stub(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        // 文法のバージョンによって type_identifier か identifier
        let id = walker.required_child_of_any(node, &["type_identifier", "identifier"])?;
        Ok(StubFields::new().with_name(Some(walker.interned_text(id))))
    }

    fn serialize(&self, stub: StubRef<'_>, out: &mut StubOutputStream) -> Result<()> {
        out.write_name(stub.name());
        Ok(())
    }

    fn deserialize(
        &self,
        input: &mut StubInputStream<'_>,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        Ok(StubFields::new().with_name(Some(input.read_name_string()?)))
    }

    fn create_psi(&self, ctx: &MaterializeContext<'_>) -> Result<PsiNode> {
        let node = PsiNode::from_context(ctx);
        let bound = match (ctx.walker(), ctx.light_node()) {
            (Some(walker), Some(light)) => walker
                .first_child_of_kind(light, "type_bound")
                .map(|bound| walker.text(bound).to_string()),
            _ => None,
        };
        Ok(match bound {
            Some(bound) => node.with_property("bound", bound),
            None => node,
        })
    }
}

/// Fields: `[name, flags, parameter count]`.
struct MethodType;

impl StubElementType for MethodType {
    fn external_id(&self) -> &'static str {
        "java.METHOD"
    }

    fn syntax_kinds(&self) -> &'static [SyntaxKind] {
        &["method_declaration", "constructor_declaration"]
    }

    fn create_stub(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        let id = walker.required_child_of_kind(node, "identifier")?;
        let mut flags = modifier_flags(walker, node);
        if walker.kind(node) == "constructor_declaration" {
            flags |= flags::CONSTRUCTOR;
        }
        let parameters = walker
            .first_child_of_kind(node, "formal_parameters")
            .map(|params| {
                walker
                    .children(params)
                    .iter()
                    .filter(|&&p| matches!(walker.kind(p), "formal_parameter" | "spread_parameter"))
                    .count()
            })
            .unwrap_or(0);
        Ok(StubFields::new()
            .with_name(Some(walker.interned_text(id)))
            .with_flags(flags)
            .with_int(parameters as i64))
    }

    fn serialize(&self, stub: StubRef<'_>, out: &mut StubOutputStream) -> Result<()> {
        let fields = stub.fields();
        out.write_name(fields.name(0));
        out.write_flags(fields.flags(1));
        out.write_i64(fields.int(2).unwrap_or(0));
        Ok(())
    }

    fn deserialize(
        &self,
        input: &mut StubInputStream<'_>,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        let name = input.read_name_string()?;
        let flags = input.read_flags()?;
        let parameters = input.read_i64()?;
        Ok(StubFields::new()
            .with_name(Some(name))
            .with_flags(flags)
            .with_int(parameters))
    }

    fn index_stub(&self, stub: StubRef<'_>, sink: &mut dyn IndexSink) {
        // コンストラクタはクラス名で引けるので載せない
        if stub.fields().flags(1) & flags::CONSTRUCTOR != 0 {
            return;
        }
        if let Some(name) = stub.name() {
            sink.occurrence(METHOD_NAME_INDEX, name);
        }
    }

    fn create_psi(&self, ctx: &MaterializeContext<'_>) -> Result<PsiNode> {
        let parameters = ctx.stub().fields().int(2).unwrap_or(0);
        Ok(PsiNode::from_context(ctx).with_property("parameterCount", parameters.to_string()))
    }
}

/// One stub per declaration statement: `int a, b;` holds both names.
///
/// Fields: `[names, flags]`.
struct FieldType;

impl StubElementType for FieldType {
    fn external_id(&self) -> &'static str {
        "java.FIELD"
    }

    fn syntax_kinds(&self) -> &'static [SyntaxKind] {
        &["field_declaration", "constant_declaration", "enum_constant"]
    }

    fn visits_children(&self) -> bool {
        false
    }

    fn create_stub(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        if walker.kind(node) == "enum_constant" {
            let id = walker.required_child_of_kind(node, "identifier")?;
            return Ok(StubFields::new()
                .with_names(vec![walker.interned_text(id)])
                .with_flags(flags::ENUM_CONSTANT | flags::PUBLIC | flags::STATIC | flags::FINAL));
        }

        let mut names = Vec::new();
        for declarator in walker.children_of_kind(node, "variable_declarator") {
            let id = walker.required_child_of_kind(declarator, "identifier")?;
            names.push(walker.interned_text(id));
        }
        if names.is_empty() {
            walker.required_child_of_kind(node, "variable_declarator")?;
        }
        Ok(StubFields::new()
            .with_names(names)
            .with_flags(modifier_flags(walker, node)))
    }

    fn serialize(&self, stub: StubRef<'_>, out: &mut StubOutputStream) -> Result<()> {
        let fields = stub.fields();
        out.write_names(fields.names(0));
        out.write_flags(fields.flags(1));
        Ok(())
    }

    fn deserialize(
        &self,
        input: &mut StubInputStream<'_>,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        let names = input.read_names()?;
        let flags = input.read_flags()?;
        Ok(StubFields::new().with_names(names).with_flags(flags))
    }

    fn index_stub(&self, stub: StubRef<'_>, sink: &mut dyn IndexSink) {
        for name in stub.fields().names(0) {
            sink.occurrence(FIELD_NAME_INDEX, name);
        }
    }

    fn create_psi(&self, ctx: &MaterializeContext<'_>) -> Result<PsiNode> {
        let names: Vec<&str> = ctx.stub().fields().names(0).iter().map(|n| &**n).collect();
        Ok(PsiNode::from_context(ctx).with_property("names", names.join(",")))
    }
}

/// Fields: `[name, flags]`.
struct ModuleType;

impl StubElementType for ModuleType {
    fn external_id(&self) -> &'static str {
        "java.MODULE"
    }

    fn syntax_kinds(&self) -> &'static [SyntaxKind] {
        &["module_declaration"]
    }

    fn create_stub(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        let id = walker.required_child_of_any(node, NAME_KINDS)?;
        let open = walker.first_child_of_kind(node, "open").is_some();
        Ok(StubFields::new()
            .with_name(Some(walker.interned_compact_text(id)))
            .with_flags(if open { flags::OPEN } else { 0 }))
    }

    fn serialize(&self, stub: StubRef<'_>, out: &mut StubOutputStream) -> Result<()> {
        out.write_name(stub.name());
        out.write_flags(stub.fields().flags(1));
        Ok(())
    }

    fn deserialize(
        &self,
        input: &mut StubInputStream<'_>,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        let name = input.read_name_string()?;
        let flags = input.read_flags()?;
        Ok(StubFields::new().with_name(Some(name)).with_flags(flags))
    }

    fn index_stub(&self, stub: StubRef<'_>, sink: &mut dyn IndexSink) {
        if let Some(name) = stub.name() {
            sink.occurrence(MODULE_NAME_INDEX, name);
        }
    }
}

/// `requires [transitive] [static] module;` Fields: `[module, flags]`.
struct RequiresType;

impl RequiresType {
    fn directive_flags(walker: &LightTreeWalker<'_>, node: LightNodeId) -> u32 {
        let mut bits = 0;
        for &child in walker.children(node) {
            // 修飾子は requires_modifier で包まれる場合と直接トークンの場合がある
            let modifier = match walker.kind(child) {
                "requires_modifier" => walker.text(child).trim(),
                kind => kind,
            };
            match modifier {
                "transitive" => bits |= flags::TRANSITIVE,
                "static" => bits |= flags::STATIC_PHASE,
                _ => {}
            }
        }
        bits
    }
}

impl StubElementType for RequiresType {
    fn external_id(&self) -> &'static str {
        "java.REQUIRES_STATEMENT"
    }

    fn syntax_kinds(&self) -> &'static [SyntaxKind] {
        &["requires_module_directive"]
    }

    fn visits_children(&self) -> bool {
        false
    }

    fn create_stub(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        let id = walker.required_child_of_any(node, NAME_KINDS)?;
        Ok(StubFields::new()
            .with_name(Some(walker.interned_compact_text(id)))
            .with_flags(Self::directive_flags(walker, node)))
    }

    fn serialize(&self, stub: StubRef<'_>, out: &mut StubOutputStream) -> Result<()> {
        out.write_name(stub.name());
        out.write_flags(stub.fields().flags(1));
        Ok(())
    }

    fn deserialize(
        &self,
        input: &mut StubInputStream<'_>,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        let name = input.read_name_string()?;
        let flags = input.read_flags()?;
        Ok(StubFields::new().with_name(Some(name)).with_flags(flags))
    }
}

/// `uses com.example.Service;` Fields: `[service class name]`.
struct UsesType;

impl StubElementType for UsesType {
    fn external_id(&self) -> &'static str {
        "java.USES_STATEMENT"
    }

    fn syntax_kinds(&self) -> &'static [SyntaxKind] {
        &["uses_module_directive"]
    }

    fn visits_children(&self) -> bool {
        false
    }

    fn create_stub(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        let id = walker.required_child_of_any(node, NAME_KINDS)?;
        Ok(StubFields::new().with_name(Some(walker.interned_compact_text(id))))
    }

    fn serialize(&self, stub: StubRef<'_>, out: &mut StubOutputStream) -> Result<()> {
        out.write_name(stub.name());
        Ok(())
    }

    fn deserialize(
        &self,
        input: &mut StubInputStream<'_>,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        Ok(StubFields::new().with_name(Some(input.read_name_string()?)))
    }

    fn index_stub(&self, stub: StubRef<'_>, sink: &mut dyn IndexSink) {
        if let Some(service) = stub.name() {
            sink.occurrence(SERVICE_USES_INDEX, service);
        }
    }
}

/// `provides Service with Impl, Other;` Fields: `[service, implementations]`.
struct ProvidesType;

impl StubElementType for ProvidesType {
    fn external_id(&self) -> &'static str {
        "java.PROVIDES_STATEMENT"
    }

    fn syntax_kinds(&self) -> &'static [SyntaxKind] {
        &["provides_module_directive"]
    }

    fn visits_children(&self) -> bool {
        false
    }

    fn create_stub(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        walker.required_child_of_any(node, NAME_KINDS)?;
        let mut names = qualified_names(walker, node).into_iter();
        let service = names.next();
        Ok(StubFields::new()
            .with_name(service)
            .with_names(names.collect()))
    }

    fn serialize(&self, stub: StubRef<'_>, out: &mut StubOutputStream) -> Result<()> {
        out.write_name(stub.name());
        out.write_names(stub.fields().names(1));
        Ok(())
    }

    fn deserialize(
        &self,
        input: &mut StubInputStream<'_>,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        let service = input.read_name_string()?;
        let implementations = input.read_names()?;
        Ok(StubFields::new()
            .with_name(Some(service))
            .with_names(implementations))
    }

    fn index_stub(&self, stub: StubRef<'_>, sink: &mut dyn IndexSink) {
        if let Some(service) = stub.name() {
            sink.occurrence(SERVICE_PROVIDES_INDEX, service);
        }
    }

    fn create_psi(&self, ctx: &MaterializeContext<'_>) -> Result<PsiNode> {
        let implementations: Vec<&str> =
            ctx.stub().fields().names(1).iter().map(|n| &**n).collect();
        Ok(PsiNode::from_context(ctx).with_property("implementations", implementations.join(",")))
    }
}
