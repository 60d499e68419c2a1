use futures::{StreamExt, stream};
use oxiri::Iri;
use oxttl::{
    NQuadsParser, NTriplesParser, TurtleSyntaxError, nquads::LowLevelNQuadsParser,
    ntriples::LowLevelNTriplesParser,
};
use rdf_handler::{
    ByteStream, CodecError, ElementStream, GraphName, NamedNode, NamedOrBlankNode, ParseOptions,
    Parser, Quad, Term, stream::fault,
};
use tracing::trace;

use crate::{Syntax, codes};

/// 增量行解析器。
///
/// # 设计动机（Why）
/// - 请求体以任意大小的字节块到达，语句却以换行分隔；解析器必须缓冲不完整的语句，同时尽早产出已完整的语句，
///   让下游在请求体尚未读完时就能开始处理；
///
/// # 行为概览（How）
/// - 语法本身交给 `oxttl` 的低层解析器：每拉取一个字节块就喂给它，再取出所有已完整的语句；
///   低层解析器只从上次停下的位置继续扫描，总开销与请求体长度成线性；
/// - 带基准 IRI 时以宽松模式解析，随后用 `oxiri` 把每个 IRI 引用解析为绝对 IRI；
/// - 第一个故障（读取、语法或 IRI）产出后即停止继续读取。
///
/// # 契约说明（What）
/// - 空行与 `#` 注释被跳过；错误消息以从 1 开始的 `line N:` 开头；
/// - N-Triples 变体遇到第四项即报语法错误。
#[derive(Clone, Copy, Debug)]
pub struct LineParser {
    syntax: Syntax,
}

impl LineParser {
    /// 构造指定变体的解析器。
    pub fn new(syntax: Syntax) -> Self {
        Self { syntax }
    }

    /// 解析器处理的变体。
    pub fn syntax(&self) -> Syntax {
        self.syntax
    }
}

impl Parser for LineParser {
    fn parse(&self, body: ByteStream, options: ParseOptions) -> ElementStream {
        let base = match options.base_iri.map(Iri::parse).transpose() {
            Ok(base) => base,
            Err(error) => {
                return fault(
                    CodecError::new(codes::BASE_IRI, "base IRI is not an absolute IRI")
                        .with_cause(error),
                );
            }
        };
        let state = ParseState {
            body,
            reader: StatementReader::new(self.syntax, base.is_some()),
            base,
            emitted: 0,
            stopped: false,
        };
        stream::unfold(state, |mut state| async move {
            loop {
                if state.stopped {
                    return None;
                }
                if let Some(outcome) = state.reader.parse_next() {
                    let item = outcome
                        .map_err(syntax_error)
                        .and_then(|quad| state.resolve(quad));
                    match &item {
                        Ok(_) => state.emitted += 1,
                        Err(_) => state.stopped = true,
                    }
                    return Some((item, state));
                }
                if state.reader.is_end() {
                    trace!(elements = state.emitted, "body parsed");
                    return None;
                }
                match state.body.next().await {
                    Some(Ok(chunk)) => state.reader.extend_from_slice(&chunk),
                    Some(Err(error)) => {
                        state.stopped = true;
                        return Some((Err(error), state));
                    }
                    None => state.reader.end(),
                }
            }
        })
        .boxed()
    }
}

/// 两种变体的低层解析器；N-Triples 的三元组落入默认图。
enum StatementReader {
    Triples(LowLevelNTriplesParser),
    Quads(LowLevelNQuadsParser),
}

impl StatementReader {
    fn new(syntax: Syntax, lenient: bool) -> Self {
        match syntax {
            Syntax::NTriples => {
                let parser = NTriplesParser::new();
                let parser = if lenient { parser.lenient() } else { parser };
                Self::Triples(parser.low_level())
            }
            Syntax::NQuads => {
                let parser = NQuadsParser::new();
                let parser = if lenient { parser.lenient() } else { parser };
                Self::Quads(parser.low_level())
            }
        }
    }

    fn extend_from_slice(&mut self, chunk: &[u8]) {
        match self {
            Self::Triples(parser) => parser.extend_from_slice(chunk),
            Self::Quads(parser) => parser.extend_from_slice(chunk),
        }
    }

    fn end(&mut self) {
        match self {
            Self::Triples(parser) => parser.end(),
            Self::Quads(parser) => parser.end(),
        }
    }

    fn is_end(&self) -> bool {
        match self {
            Self::Triples(parser) => parser.is_end(),
            Self::Quads(parser) => parser.is_end(),
        }
    }

    fn parse_next(&mut self) -> Option<Result<Quad, TurtleSyntaxError>> {
        match self {
            Self::Triples(parser) => parser
                .parse_next()
                .map(|outcome| outcome.map(|triple| triple.in_graph(GraphName::DefaultGraph))),
            Self::Quads(parser) => parser.parse_next(),
        }
    }
}

struct ParseState {
    body: ByteStream,
    reader: StatementReader,
    base: Option<Iri<String>>,
    emitted: usize,
    stopped: bool,
}

impl ParseState {
    fn resolve(&self, quad: Quad) -> Result<Quad, CodecError> {
        let Some(base) = &self.base else {
            return Ok(quad);
        };
        let resolve = |node: NamedNode| -> Result<NamedNode, CodecError> {
            base.resolve(node.as_str())
                .map(|iri| NamedNode::new_unchecked(iri.into_inner()))
                .map_err(|error| {
                    CodecError::new(
                        codes::SYNTAX,
                        format!("element {}: invalid IRI reference {node}", self.emitted + 1),
                    )
                    .with_cause(error)
                })
        };
        let subject = match quad.subject {
            NamedOrBlankNode::NamedNode(node) => resolve(node)?.into(),
            other => other,
        };
        let object = match quad.object {
            Term::NamedNode(node) => resolve(node)?.into(),
            other => other,
        };
        let graph_name = match quad.graph_name {
            GraphName::NamedNode(node) => resolve(node)?.into(),
            other => other,
        };
        Ok(Quad::new(subject, resolve(quad.predicate)?, object, graph_name))
    }
}

fn syntax_error(error: TurtleSyntaxError) -> CodecError {
    let line = error.location().start.line + 1;
    let message = format!("line {line}: {}", error.message());
    CodecError::new(codes::SYNTAX, message).with_cause(error)
}
