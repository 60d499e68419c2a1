use bytes::Bytes;
use futures::StreamExt;
use oxrdfio::RdfSerializer;
use rdf_handler::{ByteStream, CodecError, ElementStream, Quad, SerializeOptions, Serializer};

use crate::{Syntax, codes};

/// 逐元素输出规范行格式的序列化器。
///
/// # 教案式说明
/// - **Why**：每个元素独立成行，序列化器无需跨元素缓冲，输出块与输入元素一一对应，背压直接传导到元素流；
/// - **How**：对上游的每个 `Ok` 元素用 `oxrdfio::RdfSerializer` 编码出一行字节块，上游的 `Err` 原样透传；
/// - **What**：输出为 W3C 规范形式（`xsd:string` 数据类型省略、字面量按规范转义）；
///   N-Triples 变体遇到带图名的元素产出 `ntriples.graph_in_triples`。
#[derive(Clone, Copy, Debug)]
pub struct LineSerializer {
    syntax: Syntax,
}

impl LineSerializer {
    /// 构造指定变体的序列化器。
    pub fn new(syntax: Syntax) -> Self {
        Self { syntax }
    }

    /// 把单个元素编码为一行文本（含结尾换行）。
    pub fn encode_line(&self, quad: &Quad) -> Result<Vec<u8>, CodecError> {
        if !quad.graph_name.is_default_graph() && !self.syntax.allows_graph() {
            return Err(CodecError::new(
                codes::GRAPH_IN_TRIPLES,
                "N-Triples cannot carry a graph component; enable triples-only projection",
            ));
        }
        let mut writer = RdfSerializer::from_format(self.syntax.format()).for_writer(Vec::new());
        writer.serialize_quad(quad).map_err(write_error)?;
        writer.finish().map_err(write_error)
    }
}

impl Serializer for LineSerializer {
    fn serialize(&self, elements: ElementStream, _options: SerializeOptions) -> ByteStream {
        let serializer = *self;
        elements
            .map(move |element| {
                element
                    .and_then(|quad| serializer.encode_line(&quad))
                    .map(Bytes::from)
            })
            .boxed()
    }
}

fn write_error(error: std::io::Error) -> CodecError {
    CodecError::new(codes::WRITE, "element could not be written").with_cause(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{TryStreamExt, stream};
    use rdf_handler::{BlankNode, GraphName, Literal, NamedNode};

    fn named(iri: &str) -> NamedNode {
        NamedNode::new_unchecked(iri)
    }

    fn sample(graph: GraphName) -> Quad {
        Quad::new(
            named("http://example.org/subject"),
            named("http://example.org/predicate"),
            Literal::new_simple_literal("object"),
            graph,
        )
    }

    #[test]
    fn encodes_canonical_triple_line() {
        let line = LineSerializer::new(Syntax::NTriples)
            .encode_line(&sample(GraphName::DefaultGraph))
            .expect("encoded");
        assert_eq!(
            line,
            b"<http://example.org/subject> <http://example.org/predicate> \"object\" .\n"
        );
    }

    #[test]
    fn escapes_literals_and_omits_xsd_string() {
        let serializer = LineSerializer::new(Syntax::NQuads);
        let quad = Quad::new(
            BlankNode::new_unchecked("b0"),
            named("http://p"),
            Literal::new_typed_literal(
                "a \"b\"\n\\c",
                named("http://www.w3.org/2001/XMLSchema#string"),
            ),
            named("http://g"),
        );
        assert_eq!(
            serializer.encode_line(&quad).expect("encoded"),
            b"_:b0 <http://p> \"a \\\"b\\\"\\n\\\\c\" <http://g> .\n"
        );
        let tagged = Quad::new(
            named("http://s"),
            named("http://p"),
            Literal::new_language_tagged_literal_unchecked("hallo", "de"),
            GraphName::DefaultGraph,
        );
        assert_eq!(
            serializer.encode_line(&tagged).expect("encoded"),
            b"<http://s> <http://p> \"hallo\"@de .\n"
        );
    }

    #[test]
    fn triples_refuse_graph_component() {
        let error = LineSerializer::new(Syntax::NTriples)
            .encode_line(&sample(named("http://example.org/graph").into()))
            .expect_err("refused");
        assert_eq!(error.code(), codes::GRAPH_IN_TRIPLES);
    }

    #[tokio::test]
    async fn stream_yields_one_chunk_per_element() {
        let chunks: Vec<Bytes> = LineSerializer::new(Syntax::NQuads)
            .serialize(
                stream::iter([
                    Ok(sample(GraphName::DefaultGraph)),
                    Ok(sample(named("http://g").into())),
                ])
                .boxed(),
                SerializeOptions::default(),
            )
            .try_collect()
            .await
            .expect("serialized");
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].ends_with(b"<http://g> .\n"));
    }
}
