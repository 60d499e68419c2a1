//! 写出管线：协商媒体类型、序列化元素流并经由响应出口发送。
//!
//! # 教案式说明
//! - **意图（Why）**：处理器只交出图或元素流，媒体类型选择、`Content-Type` 设置、三元组投影与逐块发送
//!   都应由中间件保证顺序与错误语义；
//! - **逻辑（How）**：
//!   1. 以 `WriteOptions::media_type`（其次为出口预设的 `Content-Type`）作为覆盖值，连同候选、
//!      `Accept` 与默认值进行协商，失败时直接返回 406，不触碰出口；
//!   2. 设置 `Content-Type`，按需投影，交给序列化器；
//!   3. 逐块 `send`，每块都等待出口就绪，出口满时自然背压到序列化器；
//!   4. 等待下一块时同时监听出口关闭：客户端离开后立即丢弃序列化流，不再为无人接收的响应工作；
//!   5. 序列化故障与出口故障先到先报，另一侧随序列化流被丢弃而取消；失败后调用
//!      [`ResponseSink::abort`]，接收端据此区分截断的响应与完整响应；
//! - **契约（What）**：一次交换可以多次写出，但出口通常在第一次 `finish` 后关闭，再次写出会得到
//!   `Sink` 故障。

use std::{fmt, sync::Arc};

use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    codec::SerializeOptions,
    config::RdfHandlerConfig,
    error::{HandlerError, SinkError},
    media_type::{AcceptList, MediaType},
    model::{Graph, GraphFactory},
    negotiation::{Negotiated, NegotiationRequest, negotiate},
    sink::ResponseSink,
    stream::{ElementStream, project_to_triples},
};

/// 单次写出的选项。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// 显式媒体类型，跳过 `Accept` 协商。
    pub media_type: Option<MediaType>,
    /// 限定协商候选；为空时使用序列化器目录。
    pub candidates: Vec<MediaType>,
    /// 覆盖配置中的三元组投影开关。
    pub triples_only: Option<bool>,
    /// 原样转发给序列化器。
    pub serialize: SerializeOptions,
}

impl WriteOptions {
    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn with_candidates(mut self, candidates: impl IntoIterator<Item = MediaType>) -> Self {
        self.candidates = candidates.into_iter().collect();
        self
    }

    pub fn with_triples_only(mut self, triples_only: bool) -> Self {
        self.triples_only = Some(triples_only);
        self
    }

    pub fn with_serialize_options(mut self, options: SerializeOptions) -> Self {
        self.serialize = options;
        self
    }
}

/// 写出能力；每次交换都会安装。
pub struct ResponseWriter<F> {
    config: Arc<RdfHandlerConfig<F>>,
    accept: AcceptList,
    sink: Mutex<Box<dyn ResponseSink>>,
}

impl<F: GraphFactory> ResponseWriter<F> {
    pub(crate) fn new(
        config: Arc<RdfHandlerConfig<F>>,
        accept: AcceptList,
        sink: Box<dyn ResponseSink>,
    ) -> Self {
        Self {
            config,
            accept,
            sink: Mutex::new(sink),
        }
    }

    /// 客户端偏好。
    pub fn accept(&self) -> &AcceptList {
        &self.accept
    }

    /// 只协商、不写出。
    pub async fn negotiate(&self, options: &WriteOptions) -> Result<Negotiated, HandlerError> {
        let preset = self.sink.lock().await.content_type();
        self.resolve(options, preset)
    }

    fn resolve(
        &self,
        options: &WriteOptions,
        preset: Option<http::HeaderValue>,
    ) -> Result<Negotiated, HandlerError> {
        let explicit = options
            .media_type
            .clone()
            .or_else(|| preset.as_ref().and_then(MediaType::from_header));
        let supported = self.config.codecs.serializer_media_types();
        negotiate(&NegotiationRequest {
            explicit: explicit.as_ref(),
            accept: &self.accept,
            candidates: &options.candidates,
            supported: &supported,
            default: self.config.default_media_type.as_ref(),
            policy: self.config.override_policy,
        })
        .ok_or_else(|| HandlerError::not_acceptable(self.accept.as_str()))
    }

    /// 序列化元素流并写入响应，返回最终使用的媒体类型。
    pub async fn write_stream(
        &self,
        elements: ElementStream,
        options: WriteOptions,
    ) -> Result<MediaType, HandlerError> {
        let mut sink = self.sink.lock().await;
        let negotiated = match self.resolve(&options, sink.content_type()) {
            Ok(negotiated) => negotiated,
            Err(error) => {
                warn!(
                    rdf.handler.error_code = error.code(),
                    accept = self.accept.as_str(),
                    "no serializer could be negotiated"
                );
                return Err(error);
            }
        };
        let media_type = negotiated.media_type;
        debug!(
            rdf.handler.media_type = %media_type,
            resolution = ?negotiated.resolution,
            "response media type negotiated"
        );

        let header = media_type.content_type_value().map_err(|_| {
            HandlerError::sink(SinkError::Transport(
                format!("`{media_type}` is not a valid header value").into(),
            ))
        })?;
        sink.set_content_type(header).map_err(HandlerError::sink)?;

        let elements = if options.triples_only.unwrap_or(self.config.triples_only) {
            project_to_triples(elements)
        } else {
            elements
        };
        let mut chunks = self
            .config
            .codecs
            .import_serialize(&media_type, elements, options.serialize);

        loop {
            let next = tokio::select! {
                biased;
                () = sink.closed() => None,
                chunk = chunks.next() => Some(chunk),
            };
            let chunk = match next {
                None => {
                    drop(chunks);
                    sink.abort();
                    return Err(sink_fault(&media_type, SinkError::Closed));
                }
                Some(None) => break,
                Some(Some(Ok(chunk))) => chunk,
                Some(Some(Err(source))) => {
                    sink.abort();
                    let error = HandlerError::Serialize {
                        media_type: media_type.clone(),
                        source: Arc::new(source),
                    };
                    warn!(
                        rdf.handler.media_type = %media_type,
                        rdf.handler.error_code = error.code(),
                        error = %error,
                        "serializer failed, response aborted"
                    );
                    return Err(error);
                }
            };
            if chunk.is_empty() {
                continue;
            }
            if let Err(source) = sink.send(chunk).await {
                drop(chunks);
                sink.abort();
                return Err(sink_fault(&media_type, source));
            }
        }

        if let Err(source) = sink.finish().await {
            sink.abort();
            return Err(sink_fault(&media_type, source));
        }
        Ok(media_type)
    }

    /// 把图展开为流后写出。
    pub async fn write_graph<G: Graph + ?Sized>(
        &self,
        graph: &G,
        options: WriteOptions,
    ) -> Result<MediaType, HandlerError> {
        self.write_stream(graph.to_stream(), options).await
    }
}

fn sink_fault(media_type: &MediaType, source: SinkError) -> HandlerError {
    let error = HandlerError::sink(source);
    warn!(
        rdf.handler.media_type = %media_type,
        rdf.handler.error_code = error.code(),
        error = %error,
        "response sink failed"
    );
    error
}

impl<F> fmt::Debug for ResponseWriter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("accept", &self.accept.as_str())
            .finish_non_exhaustive()
    }
}
