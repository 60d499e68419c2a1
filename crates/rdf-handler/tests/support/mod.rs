//! 集成测试共享夹具：示例图、`text/plain` 模拟编解码器与请求构造。
//!
//! 模拟编解码器把整个请求体交给 `parse` 回调、把全部元素交给 `serialize` 回调，
//! 回调返回 `None` 时对应流为空，便于在测试中观察选项转发与故障传播。
#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream};
use http::Request;
use parking_lot::Mutex;
use rdf_handler::{
    ByteStream, CodecError, CodecMap, Dataset, ElementStream, GraphName, Literal, MediaType,
    NamedNode, ParseOptions, Quad, RequestBody, SerializeOptions,
};

pub const TEXT_PLAIN: MediaType = MediaType::from_static("text/plain");

pub const EXAMPLE_NT: &str =
    "<http://example.org/subject> <http://example.org/predicate> \"object\" .\n";

pub const EXAMPLE_NQ: &str = "<http://example.org/subject> <http://example.org/predicate> \"object\" <http://example.org/graph> .\n";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

pub fn example_quad(graph: Option<&str>) -> Quad {
    Quad::new(
        NamedNode::new_unchecked("http://example.org/subject"),
        NamedNode::new_unchecked("http://example.org/predicate"),
        Literal::new_simple_literal("object"),
        graph.map_or(GraphName::DefaultGraph, |graph| NamedNode::new_unchecked(graph).into()),
    )
}

pub fn example_dataset() -> Dataset {
    [example_quad(None)].into_iter().collect()
}

pub fn example_quad_dataset() -> Dataset {
    [example_quad(Some("http://example.org/graph"))]
        .into_iter()
        .collect()
}

type ParseFn = dyn Fn(String, ParseOptions) -> Result<Option<Quad>, CodecError> + Send + Sync;
type SerializeFn =
    dyn Fn(Vec<Quad>, SerializeOptions) -> Result<Option<String>, CodecError> + Send + Sync;

/// 只注册 `text/plain` 的模拟目录。
pub fn formats_mock<P, S>(parse: P, serialize: S) -> CodecMap
where
    P: Fn(String, ParseOptions) -> Result<Option<Quad>, CodecError> + Send + Sync + 'static,
    S: Fn(Vec<Quad>, SerializeOptions) -> Result<Option<String>, CodecError>
        + Send
        + Sync
        + 'static,
{
    let parse: Arc<ParseFn> = Arc::new(parse);
    let serialize: Arc<SerializeFn> = Arc::new(serialize);
    CodecMap::new()
        .with_parser(TEXT_PLAIN, move |body: ByteStream, options: ParseOptions| {
            let parse = Arc::clone(&parse);
            stream::once(async move {
                let chunks: Vec<Bytes> = body.try_collect().await?;
                let text = String::from_utf8_lossy(&chunks.concat()).into_owned();
                parse(text, options)
            })
            .filter_map(|outcome| async move { outcome.transpose() })
            .boxed()
        })
        .with_serializer(
            TEXT_PLAIN,
            move |elements: ElementStream, options: SerializeOptions| {
                let serialize = Arc::clone(&serialize);
                stream::once(async move {
                    let quads: Vec<Quad> = elements.try_collect().await?;
                    serialize(quads, options)
                })
                .filter_map(|outcome| async move { outcome.map(|text| text.map(Bytes::from)).transpose() })
                .boxed()
            },
        )
}

/// 记录解析器收到的选项。
pub fn recording_parser(seen: Arc<Mutex<Option<ParseOptions>>>) -> CodecMap {
    formats_mock(
        move |_, options| {
            *seen.lock() = Some(options);
            Ok(None)
        },
        |_, _| Ok(None),
    )
}

/// 记录序列化器收到的选项，并输出固定文本 `test`。
pub fn recording_serializer(seen: Arc<Mutex<Option<SerializeOptions>>>) -> CodecMap {
    formats_mock(
        |_, _| Ok(None),
        move |_, options| {
            *seen.lock() = Some(options);
            Ok(Some("test".to_owned()))
        },
    )
}

pub fn post(content_type: Option<&str>, host: Option<&str>, body: &str) -> Request<RequestBody> {
    let mut builder = Request::post("/resource/name");
    if let Some(content_type) = content_type {
        builder = builder.header(http::header::CONTENT_TYPE, content_type);
    }
    if let Some(host) = host {
        builder = builder.header(http::header::HOST, host);
    }
    builder
        .body(RequestBody::from(body.to_owned()))
        .expect("request")
}

pub fn get(accept: Option<&str>) -> Request<RequestBody> {
    let mut builder = Request::get("/resource/name");
    if let Some(accept) = accept {
        builder = builder.header(http::header::ACCEPT, accept);
    }
    builder.body(RequestBody::Empty).expect("request")
}
