//! 读取能力集成测试。
//!
//! # 测试目标
//! - 验证读取能力只在请求体非空且媒体类型可解析时安装；
//! - 验证物化读取与流式读取的结果、记忆化语义，以及基准 IRI 和选项向解析器的传递。
//!
//! # 结构安排
//! - 使用 `rdf-codec-ntriples` 作为真实编解码目录，`support::formats_mock` 作为可观察的模拟目录；
//! - 每个用例独立构造 [`RdfHandler`] 与请求，不共享状态。

mod support;

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use futures::TryStreamExt;
use parking_lot::Mutex;
use rdf_handler::{
    BaseIriPolicy, CodecError, DatasetFactory, Graph, GraphName, HandlerError, Literal, MemorySink,
    NamedNode, NamedOrBlankNode, ParseOptions, Quad, RdfExchange, RdfHandler, RdfHandlerConfig,
    RequestBody,
};
use support::{EXAMPLE_NT, RDF_TYPE, example_dataset, formats_mock, get, post, recording_parser};

fn ntriples_handler() -> RdfHandler {
    RdfHandler::new(RdfHandlerConfig::new(rdf_codec_ntriples::directory()))
}

fn attach(handler: &RdfHandler, request: &mut http::Request<RequestBody>) -> RdfExchange {
    handler.install(request, MemorySink::new())
}

/// Why: 没有请求体的 GET 不应出现读取能力。
#[test]
fn no_reader_without_content() {
    let handler = ntriples_handler();
    let exchange = attach(&handler, &mut get(None));
    assert!(exchange.reader().is_none());
    assert!(exchange.writer().accept().is_empty());
}

/// Why: 声明的媒体类型没有解析器时，读取能力缺失而非报错。
#[test]
fn no_reader_for_unknown_media_type() {
    let handler = ntriples_handler();
    let exchange = attach(&handler, &mut post(Some("text/plain"), None, EXAMPLE_NT));
    assert!(exchange.reader().is_none());
    assert!(matches!(
        exchange.require_reader(),
        Err(HandlerError::UnsupportedMediaType { media_type }) if media_type == "text/plain"
    ));
}

#[test]
fn reader_installed_for_parsable_content() {
    let handler = ntriples_handler();
    let mut request = post(Some("application/n-triples"), None, EXAMPLE_NT);
    attach(&handler, &mut request);
    let exchange = RdfExchange::<DatasetFactory>::from_request(&request).expect("attached");
    assert!(exchange.reader().is_some());
}

/// Why: 物化读取的内容应与示例图一致。
#[tokio::test]
async fn parses_content_into_dataset() {
    let handler = ntriples_handler();
    let exchange = attach(&handler, &mut post(Some("application/n-triples"), None, EXAMPLE_NT));
    let dataset = exchange
        .read_graph(ParseOptions::default())
        .await
        .expect("dataset");
    assert_eq!(*dataset, example_dataset());
}

/// Why: 请求缺少 `Content-Type` 时使用默认媒体类型。
#[tokio::test]
async fn default_media_type_applies_to_requests_without_content_type() {
    let handler = RdfHandler::new(
        RdfHandlerConfig::new(rdf_codec_ntriples::directory())
            .with_default_media_type(rdf_handler::MediaType::N_TRIPLES),
    );
    let exchange = attach(&handler, &mut post(None, None, EXAMPLE_NT));
    let dataset = exchange
        .read_graph(ParseOptions::default())
        .await
        .expect("dataset");
    assert_eq!(dataset.len(), 1);
}

/// Why: 启用 `FromRequest` 后，相对 IRI 依据 `Host` 与路径解析。
#[tokio::test]
async fn base_iri_from_request_resolves_relative_subject() {
    let handler = RdfHandler::new(
        RdfHandlerConfig::new(rdf_codec_ntriples::directory())
            .with_base_iri(BaseIriPolicy::FromRequest),
    );
    let body = format!("<subject> <{RDF_TYPE}> <http://example.com/Type> .");
    let exchange = attach(
        &handler,
        &mut post(Some("application/n-triples"), Some("example.com"), &body),
    );
    let dataset = exchange
        .read_graph(ParseOptions::default())
        .await
        .expect("dataset");
    let quads = dataset.quads();
    assert_eq!(
        quads[0].subject,
        NamedOrBlankNode::from(NamedNode::new_unchecked("http://example.com/resource/subject"))
    );
}

/// Why: 同一交换上多次物化读取返回同一实例，解析只发生一次。
#[tokio::test]
async fn repeated_reads_share_one_dataset() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let codecs = formats_mock(
        move |text, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Quad::new(
                NamedNode::new_unchecked("http://example.org/s"),
                NamedNode::new_unchecked("http://example.org/p"),
                Literal::new_simple_literal(text),
                GraphName::DefaultGraph,
            )))
        },
        |_, _| Ok(None),
    );
    let handler = RdfHandler::new(RdfHandlerConfig::new(codecs));
    let exchange = attach(&handler, &mut post(Some("text/plain"), None, "payload"));

    let (first, second) = tokio::join!(
        exchange.read_graph(ParseOptions::default()),
        exchange.read_graph(ParseOptions::default()),
    );
    let (first, second) = (first.expect("first"), second.expect("second"));
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Why: 解析器故障属于客户端输入问题，映射为 400。
#[tokio::test]
async fn parser_errors_surface_as_parse_faults() {
    let codecs = formats_mock(
        |_, _| Err(CodecError::new("mock.parse", "cannot parse")),
        |_, _| Ok(None),
    );
    let handler = RdfHandler::new(RdfHandlerConfig::new(codecs));
    let exchange = attach(&handler, &mut post(Some("text/plain"), None, "payload"));
    let error = exchange
        .read_graph(ParseOptions::default())
        .await
        .expect_err("parse fault");
    assert!(matches!(error, HandlerError::Parse { .. }));
    assert_eq!(error.status(), http::StatusCode::BAD_REQUEST);
}

/// Why: N-Triples 语法错误同样经由解析故障上报。
#[tokio::test]
async fn malformed_ntriples_is_a_client_fault() {
    let handler = ntriples_handler();
    let exchange = attach(
        &handler,
        &mut post(Some("application/n-triples"), None, "<http://a> not-an-iri ."),
    );
    let error = exchange
        .read_graph(ParseOptions::default())
        .await
        .expect_err("syntax");
    assert!(error.is_client_fault());
    assert_eq!(error.code(), rdf_handler::codes::PARSE);
}

/// Why: 调用方给出的选项原样到达解析器。
#[tokio::test]
async fn options_are_forwarded_to_the_parser() {
    let seen = Arc::new(Mutex::new(None));
    let handler = RdfHandler::new(RdfHandlerConfig::new(recording_parser(Arc::clone(&seen))));
    let options = ParseOptions::default()
        .with_property("a", "1")
        .with_property("b", "2");

    let exchange = attach(&handler, &mut post(Some("text/plain"), None, "payload"));
    exchange.read_graph(options.clone()).await.expect("graph");
    assert_eq!(seen.lock().clone(), Some(options.clone()));

    let exchange = attach(&handler, &mut post(Some("text/plain"), None, "payload"));
    let quads: Vec<Quad> = exchange
        .read_stream(options.clone())
        .expect("reader")
        .try_collect()
        .await
        .expect("stream");
    assert!(quads.is_empty());
    assert_eq!(seen.lock().clone(), Some(options));
}

/// Why: 基准 IRI 策略的计算结果以 `base_iri` 选项交给解析器。
#[tokio::test]
async fn base_iri_reaches_the_parser() {
    let seen = Arc::new(Mutex::new(None));
    let handler = RdfHandler::new(
        RdfHandlerConfig::new(recording_parser(Arc::clone(&seen)))
            .with_base_iri(BaseIriPolicy::FromRequest),
    );
    let exchange = attach(&handler, &mut post(Some("text/plain"), Some("example.com"), "x"));
    exchange.read_graph(ParseOptions::default()).await.expect("graph");
    assert_eq!(
        seen.lock().clone(),
        Some(ParseOptions::default().with_base_iri("http://example.com/resource/name"))
    );
}

/// Why: 自定义基准 IRI 计算替换请求 URL。
#[tokio::test]
async fn computed_base_iri_reaches_the_parser() {
    let seen = Arc::new(Mutex::new(None));
    let handler = RdfHandler::new(
        RdfHandlerConfig::new(recording_parser(Arc::clone(&seen))).with_base_iri(
            BaseIriPolicy::from_fn(|_| Some("http://example.com/resource-base/".to_owned())),
        ),
    );
    let exchange = attach(&handler, &mut post(Some("text/plain"), Some("example.com"), "x"));
    let stream = exchange.read_stream(ParseOptions::default()).expect("reader");
    let _: Vec<Quad> = stream.try_collect().await.expect("stream");
    assert_eq!(
        seen.lock().clone(),
        Some(ParseOptions::default().with_base_iri("http://example.com/resource-base/"))
    );
}

/// Why: 基准 IRI 无法计算时，故障以 400 语义出现在读取结果中。
#[tokio::test]
async fn missing_host_is_a_base_iri_fault() {
    let handler = RdfHandler::new(
        RdfHandlerConfig::new(rdf_codec_ntriples::directory())
            .with_base_iri(BaseIriPolicy::FromRequest),
    );
    let exchange = attach(&handler, &mut post(Some("application/n-triples"), None, EXAMPLE_NT));
    let error = exchange
        .read_graph(ParseOptions::default())
        .await
        .expect_err("no host");
    assert!(matches!(error, HandlerError::BaseIri { .. }));
    assert!(error.is_client_fault());
}

/// Why: 流式请求体在读完前无法判空，到达解析器的零字节体应得到空图。
#[tokio::test]
async fn zero_byte_streaming_body_yields_empty_graph() {
    let handler = ntriples_handler();
    let mut request = http::Request::post("/")
        .header(http::header::CONTENT_TYPE, "application/n-triples")
        .body(RequestBody::from_stream(futures::stream::empty::<
            Result<bytes::Bytes, std::io::Error>,
        >()))
        .expect("request");
    let exchange = attach(&handler, &mut request);
    let dataset = exchange
        .read_graph(ParseOptions::default())
        .await
        .expect("dataset");
    assert!(dataset.is_empty());
}

/// Why: 分块到达的请求体在流式读取中逐条产出。
#[tokio::test]
async fn streaming_body_is_parsed_incrementally() {
    let handler = ntriples_handler();
    let chunks = EXAMPLE_NT
        .as_bytes()
        .chunks(7)
        .map(|chunk| Ok::<_, std::io::Error>(bytes::Bytes::copy_from_slice(chunk)))
        .collect::<Vec<_>>();
    let mut request = http::Request::post("/")
        .header(http::header::CONTENT_TYPE, "application/n-triples; charset=utf-8")
        .body(RequestBody::from_stream(futures::stream::iter(chunks)))
        .expect("request");
    let exchange = attach(&handler, &mut request);
    let quads: Vec<Quad> = exchange
        .read_stream(ParseOptions::default())
        .expect("reader")
        .try_collect()
        .await
        .expect("stream");
    assert_eq!(quads, example_dataset().quads());
}

/// Why: 大请求体以极小分块到达时，解析结果与整块到达一致。
#[tokio::test]
async fn large_body_in_small_chunks_parses_every_statement() {
    let handler = ntriples_handler();
    let body: String = (0..2_000)
        .map(|n| format!("<http://example.org/s{n}> <http://example.org/p> \"value {n}\" .\n"))
        .collect();
    let chunks = body
        .as_bytes()
        .chunks(3)
        .map(|chunk| Ok::<_, std::io::Error>(bytes::Bytes::copy_from_slice(chunk)))
        .collect::<Vec<_>>();
    let mut request = http::Request::post("/")
        .header(http::header::CONTENT_TYPE, "application/n-triples")
        .body(RequestBody::from_stream(futures::stream::iter(chunks)))
        .expect("request");
    let exchange = attach(&handler, &mut request);
    let dataset = exchange
        .read_graph(ParseOptions::default())
        .await
        .expect("dataset");
    assert_eq!(dataset.len(), 2_000);
    assert!(dataset.contains(&Quad::new(
        NamedNode::new_unchecked("http://example.org/s1999"),
        NamedNode::new_unchecked("http://example.org/p"),
        Literal::new_simple_literal("value 1999"),
        GraphName::DefaultGraph,
    )));
}
