/// テスト用の共通フィクスチャとビルダー
///
/// 小さな「トイ言語」の要素型とライトツリーを提供する。
/// 下流のクレートからは `test-fixtures` フィーチャで利用できる。
use crate::codec::{StubInputStream, StubOutputStream};
use crate::element_type::{ElementTypeRegistry, StubElementType};
use crate::error::Result;
use crate::index_sink::{IndexSink, StubIndexKey};
use crate::light_tree::{LightNodeId, LightTree, LightTreeBuilder, LightTreeWalker, SyntaxKind};
use crate::stub::{StubFields, StubRef};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const TOY_FILE: &str = "toy.FILE";
pub const TOY_CLASS: &str = "toy.CLASS";
pub const TOY_TYPE_PARAMETER: &str = "toy.TYPE_PARAMETER";

/// クラスの短い名前のインデックス
pub const TOY_CLASS_INDEX: StubIndexKey = StubIndexKey::new("toy.class.shortName");

/// `identifier` の子を名前として持つ汎用の要素型
pub struct NamedType {
    external_id: &'static str,
    kinds: &'static [SyntaxKind],
    name_required: bool,
    index: Option<StubIndexKey>,
    format_version: u32,
}

impl NamedType {
    /// 名前が必須の要素型を作成
    pub fn new(external_id: &'static str, kinds: &'static [SyntaxKind]) -> Self {
        Self {
            external_id,
            kinds,
            name_required: true,
            index: None,
            format_version: 0,
        }
    }

    /// 名前のない（あってもよい）要素型
    pub fn optional_name(mut self) -> Self {
        self.name_required = false;
        self
    }

    /// 名前をインデックスに登録する
    pub fn indexed(mut self, index: StubIndexKey) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_format_version(mut self, version: u32) -> Self {
        self.format_version = version;
        self
    }
}

impl StubElementType for NamedType {
    fn external_id(&self) -> &'static str {
        self.external_id
    }

    fn syntax_kinds(&self) -> &'static [SyntaxKind] {
        self.kinds
    }

    fn format_version(&self) -> u32 {
        self.format_version
    }

    fn create_stub(
        &self,
        walker: &LightTreeWalker<'_>,
        node: LightNodeId,
        _parent: Option<StubRef<'_>>,
    ) -> Result<StubFields> {
        let name = if self.name_required {
            Some(walker.required_child_of_kind(node, "identifier")?)
        } else {
            walker.first_child_of_kind(node, "identifier")
        };
        Ok(StubFields::new().with_name(name.map(|id| walker.interned_text(id))))
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
        let name = if self.name_required {
            Some(input.read_name_string()?)
        } else {
            input.read_name()?
        };
        Ok(StubFields::new().with_name(name))
    }

    fn index_stub(&self, stub: StubRef<'_>, sink: &mut dyn IndexSink) {
        if let (Some(index), Some(name)) = (self.index, stub.name()) {
            sink.occurrence(index, name);
        }
    }
}

/// `index_stub` の呼び出し回数を数える要素型（構文種別 `node`）
pub struct CountingType {
    pub calls: AtomicUsize,
}

impl CountingType {
    pub const FIRST: StubIndexKey = StubIndexKey::new("count.first");
    pub const SECOND: StubIndexKey = StubIndexKey::new("count.second");

    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl Default for CountingType {
    fn default() -> Self {
        Self::new()
    }
}

impl StubElementType for CountingType {
    fn external_id(&self) -> &'static str {
        "count.NODE"
    }

    fn syntax_kinds(&self) -> &'static [SyntaxKind] {
        &["node"]
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

    fn index_stub(&self, stub: StubRef<'_>, sink: &mut dyn IndexSink) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = stub.id().index().to_string();
        sink.occurrence(Self::FIRST, &key);
        sink.occurrence(Self::SECOND, &key);
    }
}

/// トイ言語のレジストリ
///
/// `file` / `class` / `type_parameter` が要素型、
/// `type_parameters` / `block` / `class_body` は透過ノード。
pub fn toy_registry() -> Arc<ElementTypeRegistry> {
    let mut registry = ElementTypeRegistry::new();
    let types: [Arc<dyn StubElementType>; 3] = [
        Arc::new(NamedType::new(TOY_FILE, &["file"]).optional_name()),
        Arc::new(NamedType::new(TOY_CLASS, &["class"]).indexed(TOY_CLASS_INDEX)),
        Arc::new(NamedType::new(TOY_TYPE_PARAMETER, &["type_parameter"])),
    ];
    for element_type in types {
        if let Err(e) = registry.register(element_type) {
            panic!("toy registry: {}", e);
        }
    }
    for kind in ["type_parameters", "block", "class_body"] {
        if let Err(e) = registry.mark_transparent(kind) {
            panic!("toy registry: {}", e);
        }
    }
    registry.freeze()
}

/// `file > class(identifier, type_parameters(type_parameter(identifier)*))`
///
/// ソーステキストは `Pair T U` のようにトークンを空白でつないだもの。
pub fn generic_class_tree(name: &str, params: &[&str]) -> LightTree {
    ToyTreeBuilder::new().class(name, params).build()
}

/// 複数のクラスを持つトイファイルのビルダー
pub struct ToyTreeBuilder {
    builder: LightTreeBuilder,
}

impl ToyTreeBuilder {
    pub fn new() -> Self {
        let mut builder = LightTreeBuilder::new();
        builder.start_node("file");
        Self { builder }
    }

    /// クラス宣言を追加
    pub fn class(mut self, name: &str, params: &[&str]) -> Self {
        self.builder.start_node("class").token("identifier", name);
        if !params.is_empty() {
            self.builder.start_node("type_parameters");
            for param in params {
                self.builder
                    .start_node("type_parameter")
                    .token("identifier", param)
                    .finish_node();
            }
            self.builder.finish_node();
        }
        self.builder.finish_node();
        self
    }

    /// `count` 個のクラスを追加（ベンチマーク用）
    pub fn with_classes(mut self, count: usize, params: &[&str]) -> Self {
        for i in 0..count {
            self = self.class(&format!("Class{}", i), params);
        }
        self
    }

    pub fn build(mut self) -> LightTree {
        self.builder.finish_node();
        match self.builder.finish() {
            Ok(tree) => tree,
            Err(e) => panic!("toy tree: {}", e),
        }
    }
}

impl Default for ToyTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
