//! 能力装配：把读取与写出能力挂到单次 HTTP 交换上。
//!
//! # 教案式说明
//! - **意图（Why）**：处理器需要在请求上找到“读图 / 写图”的能力，而能力是否可用取决于请求体与媒体类型；
//!   以 `http::Extensions` 中的 [`RdfExchange`] 承载，处理器无需知道中间件的存在形式；
//! - **结构（How）**：[`RdfHandler`] 持有共享配置，[`RdfHandler::install`] 无条件构造能力集并写入扩展，
//!   [`RdfHandler::ensure_attached`] 只在扩展中缺少能力集时才安装；
//! - **契约（What）**：
//!   - 写出能力总是存在；读取能力仅在请求体非空且媒体类型有解析器时存在；
//!   - 安装本身是同步的，解析推迟到首次读取；
//!   - 请求体在安装时被移入读取能力，请求上留下 `RequestBody::Empty`；
//!   - 是否已安装由不带类型参数的 [`RdfAttached`] 标记判断，与图工厂类型无关：请求体只有一份，
//!     换一种工厂类型的中间件实例也不能再次取走它。

use std::{fmt, sync::Arc};

use http::{HeaderMap, Request, request::Parts};
use tracing::trace;

use crate::{
    body::RequestBody,
    codec::ParseOptions,
    config::{RdfHandlerConfig, RequestMeta},
    error::HandlerError,
    incoming::RequestReader,
    media_type::{AcceptList, MediaType},
    model::{DatasetFactory, Graph, GraphFactory},
    negotiation::resolve_request_media_type,
    outgoing::{ResponseWriter, WriteOptions},
    sink::ResponseSink,
    stream::ElementStream,
};

/// 请求扩展中的安装标记。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RdfAttached;

/// RDF 内容协商中间件入口。
pub struct RdfHandler<F: GraphFactory = DatasetFactory> {
    config: Arc<RdfHandlerConfig<F>>,
}

impl<F: GraphFactory> RdfHandler<F> {
    pub fn new(config: RdfHandlerConfig<F>) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RdfHandlerConfig<F> {
        &self.config
    }

    /// 由请求头部与请求体构造能力集，不触碰任何请求对象。
    pub fn attach(
        &self,
        parts: &Parts,
        body: RequestBody,
        sink: impl ResponseSink,
    ) -> RdfExchange<F> {
        self.build(RequestMeta::from_parts(parts), body, Box::new(sink))
    }

    /// 无条件安装能力集，替换请求上已有的能力集。
    pub fn install(
        &self,
        request: &mut Request<RequestBody>,
        sink: impl ResponseSink,
    ) -> RdfExchange<F> {
        let body = std::mem::take(request.body_mut());
        let meta = RequestMeta {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        };
        let exchange = self.build(meta, body, Box::new(sink));
        request.extensions_mut().insert(exchange.clone());
        request.extensions_mut().insert(RdfAttached);
        exchange
    }

    /// 请求上尚无能力集时安装；返回是否发生了安装。
    ///
    /// 已存在的能力集保持原样，包括其中尚未读取的请求体。
    pub fn ensure_attached(
        &self,
        request: &mut Request<RequestBody>,
        sink: impl ResponseSink,
    ) -> bool {
        if request.extensions().get::<RdfAttached>().is_some() {
            trace!(
                rdf.handler.stage = "attach",
                "capabilities already attached"
            );
            return false;
        }
        self.install(request, sink);
        true
    }

    /// 确保能力集已安装，再把请求交给下游处理器。
    pub async fn call<S, N, Fut>(&self, mut request: Request<RequestBody>, sink: S, next: N) -> Fut::Output
    where
        S: ResponseSink,
        N: FnOnce(Request<RequestBody>) -> Fut,
        Fut: Future,
    {
        self.ensure_attached(&mut request, sink);
        next(request).await
    }

    fn build(
        &self,
        meta: RequestMeta,
        body: RequestBody,
        sink: Box<dyn ResponseSink>,
    ) -> RdfExchange<F> {
        let accept = AcceptList::from_headers(&meta.headers);
        let writer = Arc::new(ResponseWriter::new(Arc::clone(&self.config), accept, sink));
        let declared = meta
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let reader = if body.is_empty() || declares_zero_length(&meta.headers) {
            trace!(
                rdf.handler.stage = "attach",
                "empty request body, read capabilities not installed"
            );
            None
        } else {
            match resolve_request_media_type(
                &meta.headers,
                self.config.default_media_type.as_ref(),
                self.config.codecs.as_ref(),
            ) {
                Some(media_type) => {
                    trace!(
                        rdf.handler.stage = "attach",
                        rdf.handler.media_type = %media_type,
                        "read capabilities installed"
                    );
                    Some(Arc::new(RequestReader::new(
                        Arc::clone(&self.config),
                        media_type,
                        meta,
                        body,
                    )))
                }
                None => {
                    trace!(
                        rdf.handler.stage = "attach",
                        content_type = declared.as_deref().unwrap_or_default(),
                        "no parser for request media type, read capabilities not installed"
                    );
                    None
                }
            }
        };

        RdfExchange {
            reader,
            writer,
            declared,
        }
    }
}

impl<F: GraphFactory> Clone for RdfHandler<F> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<F: GraphFactory> fmt::Debug for RdfHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdfHandler")
            .field("config", &self.config)
            .finish()
    }
}

fn declares_zero_length(headers: &HeaderMap) -> bool {
    headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim() == "0")
}

/// 单次交换上的能力集。
pub struct RdfExchange<F: GraphFactory = DatasetFactory> {
    reader: Option<Arc<RequestReader<F>>>,
    writer: Arc<ResponseWriter<F>>,
    declared: Option<String>,
}

impl<F: GraphFactory> RdfExchange<F> {
    /// 从请求扩展中取出能力集。
    pub fn from_request<B>(request: &Request<B>) -> Option<&Self> {
        request.extensions().get::<Self>()
    }

    /// 读取能力；请求体为空或媒体类型不受支持时为 `None`。
    pub fn reader(&self) -> Option<&Arc<RequestReader<F>>> {
        self.reader.as_ref()
    }

    /// 读取能力；缺失时给出可映射为 415 的错误。
    pub fn require_reader(&self) -> Result<&RequestReader<F>, HandlerError> {
        self.reader
            .as_deref()
            .ok_or_else(|| HandlerError::UnsupportedMediaType {
                media_type: self.declared.clone().unwrap_or_default(),
            })
    }

    pub fn writer(&self) -> &ResponseWriter<F> {
        &self.writer
    }

    /// 读取能力使用的媒体类型。
    pub fn request_media_type(&self) -> Option<&MediaType> {
        self.reader.as_deref().map(RequestReader::media_type)
    }

    pub async fn read_graph(&self, options: ParseOptions) -> Result<Arc<F::Graph>, HandlerError> {
        self.require_reader()?.read_graph(options).await
    }

    pub fn read_stream(&self, options: ParseOptions) -> Result<ElementStream, HandlerError> {
        Ok(self.require_reader()?.read_stream(options))
    }

    pub async fn write_graph<G: Graph + ?Sized>(
        &self,
        graph: &G,
        options: WriteOptions,
    ) -> Result<MediaType, HandlerError> {
        self.writer.write_graph(graph, options).await
    }

    pub async fn write_stream(
        &self,
        elements: ElementStream,
        options: WriteOptions,
    ) -> Result<MediaType, HandlerError> {
        self.writer.write_stream(elements, options).await
    }
}

impl<F: GraphFactory> Clone for RdfExchange<F> {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
            writer: Arc::clone(&self.writer),
            declared: self.declared.clone(),
        }
    }
}

impl<F: GraphFactory> fmt::Debug for RdfExchange<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RdfExchange")
            .field("reader", &self.reader)
            .field("writer", &self.writer)
            .finish()
    }
}
