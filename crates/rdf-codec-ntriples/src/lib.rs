#![warn(missing_docs)]

//! `rdf-codec-ntriples` 为 `rdf-handler` 提供基于行的 N-Triples / N-Quads 编解码扩展。
//!
//! # 教案背景（Why）
//! - 中间件核心不定义任何 RDF 语法，本 crate 演示如何在不修改核心的前提下，通过 [`CodecDirectory`]
//!   契约接入一对真实的解析器与序列化器；
//! - 选择行格式是因为每条语句恰好一行，能直观展示跨字节块缓冲、逐行产出与行号定位错误的流式模式；
//! - 语法细节不自己实现：解析交给 `oxttl` 的低层增量解析器，序列化交给 `oxrdfio`，IRI 解析交给 `oxiri`，
//!   本 crate 只负责把它们接到 `rdf-handler` 的流契约上。
//!
//! # 使用概览（How）
//! - [`directory`] 返回已注册 `application/n-triples` 与 `application/n-quads` 的 [`CodecMap`]，
//!   可直接交给 `RdfHandlerConfig::new`；
//! - 也可以单独实例化 [`LineParser`]、[`LineSerializer`]，与其他编解码器合并到同一目录。
//!
//! # 合约说明（What）
//! - 解析器按语句增量产出元素，相对 IRI 依据 `ParseOptions::base_iri` 解析；N-Triples 拒绝图名；
//! - 序列化器每个元素输出一行规范形式，`xsd:string` 数据类型省略；N-Triples 遇到图名即报错；
//! - 错误码见 [`codes`]，语法错误消息携带从 1 开始的行号。
//!
//! # 风险提示与后续（Trade-offs）
//! - 带基准 IRI 时解析以宽松模式进行，以便接受相对 IRI；此时 IRI 以外的字符校验也随之放宽。
//!
//! [`CodecDirectory`]: rdf_handler::CodecDirectory

mod parse;
mod serialize;

use std::sync::Arc;

use oxrdfio::RdfFormat;
use rdf_handler::{CodecMap, MediaType};

pub use parse::LineParser;
pub use serialize::LineSerializer;

/// 本扩展使用的稳定错误码。
pub mod codes {
    /// 语句不符合行格式语法（包括非法 UTF-8 与无法解析的 IRI 引用）。
    pub const SYNTAX: &str = "ntriples.syntax";
    /// 解析选项中的基准 IRI 不是绝对 IRI。
    pub const BASE_IRI: &str = "ntriples.base_iri";
    /// 单个元素无法写出。
    pub const WRITE: &str = "ntriples.write";
    /// N-Triples 序列化遇到带图名的元素。
    pub const GRAPH_IN_TRIPLES: &str = "ntriples.graph_in_triples";
}

/// 行格式的两种变体。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syntax {
    /// `application/n-triples`：三项，不允许图名。
    NTriples,
    /// `application/n-quads`：三项或四项。
    NQuads,
}

impl Syntax {
    /// 对应的媒体类型。
    pub fn media_type(self) -> MediaType {
        match self {
            Self::NTriples => MediaType::N_TRIPLES,
            Self::NQuads => MediaType::N_QUADS,
        }
    }

    fn format(self) -> RdfFormat {
        match self {
            Self::NTriples => RdfFormat::NTriples,
            Self::NQuads => RdfFormat::NQuads,
        }
    }

    fn allows_graph(self) -> bool {
        matches!(self, Self::NQuads)
    }
}

/// 注册了 N-Triples 与 N-Quads 解析器、序列化器的编解码目录。
///
/// 注册顺序为 N-Triples 在前，协商平局时优先选择 N-Triples。
pub fn directory() -> CodecMap {
    let mut map = CodecMap::new();
    for syntax in [Syntax::NTriples, Syntax::NQuads] {
        map.register_parser(syntax.media_type(), Arc::new(LineParser::new(syntax)));
        map.register_serializer(syntax.media_type(), Arc::new(LineSerializer::new(syntax)));
    }
    map
}
