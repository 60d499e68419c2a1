//! 读取管线：把请求体解析为元素流或物化图。
//!
//! # 教案式说明
//! - **意图（Why）**：处理器可能只需要流式遍历，也可能需要随机访问的完整图；两种形态共享同一请求体，
//!   而请求体只能读取一次；
//! - **结构（How）**：请求体放在 `parking_lot::Mutex<Option<_>>` 中，首个读取者取走；物化读取被建模为
//!   一个自有的 `Shared` 任务，首次调用时创建并保存在读取能力中，调用方只是等待它。调用方的 `Future`
//!   被取消（超时、`select!` 落败）时任务本身不受影响，下一次调用从断点继续等待同一结果；
//! - **契约（What）**：
//!   - [`RequestReader::read_stream`] 立即返回，准备阶段与解析故障都在流内交付；
//!   - [`RequestReader::read_graph`] 多次调用返回同一个 `Arc`，失败同样被记住；
//!   - 物化已开始后再调用 `read_stream` 会等待物化结果并回放图内容；请求体被流式读取消费后再读取，得到
//!     `rdf.handler.body_consumed`。

use std::{fmt, sync::Arc};

use futures::{
    FutureExt, StreamExt,
    future::{BoxFuture, Shared},
};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    body::RequestBody,
    codec::ParseOptions,
    config::{RdfHandlerConfig, RequestMeta},
    error::{CodecError, HandlerError, codes},
    media_type::MediaType,
    model::{Graph, GraphFactory},
    stream::{DeferredElementStream, ElementStream, collect_into, fault},
};

/// 可被多个调用方共同等待的物化任务。
type Materialization<G> = Shared<BoxFuture<'static, Result<Arc<G>, HandlerError>>>;

/// 读取能力；仅在请求体非空且声明的媒体类型有解析器时安装。
pub struct RequestReader<F: GraphFactory> {
    config: Arc<RdfHandlerConfig<F>>,
    media_type: MediaType,
    meta: Arc<RequestMeta>,
    body: Mutex<Option<RequestBody>>,
    graph: Mutex<Option<Materialization<F::Graph>>>,
}

impl<F: GraphFactory> RequestReader<F> {
    pub(crate) fn new(
        config: Arc<RdfHandlerConfig<F>>,
        media_type: MediaType,
        meta: RequestMeta,
        body: RequestBody,
    ) -> Self {
        Self {
            config,
            media_type,
            meta: Arc::new(meta),
            body: Mutex::new(Some(body)),
            graph: Mutex::new(None),
        }
    }

    /// 用于解析请求体的媒体类型。
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    /// 以流的形式读取请求图数据。
    pub fn read_stream(&self, options: ParseOptions) -> ElementStream {
        let Some(materialization) = self.graph.lock().clone() else {
            return self.parse(options);
        };
        trace!(
            rdf.handler.media_type = %self.media_type,
            rdf.handler.stage = "replay",
            "replaying materialized graph as stream"
        );
        DeferredElementStream::new(async move {
            materialization
                .await
                .map(|graph| graph.to_stream())
                .map_err(|error| CodecError::new(error.code(), error.to_string()))
        })
        .boxed()
    }

    /// 物化读取；首次调用启动解析，之后的调用等待同一结果。
    ///
    /// 只有首次调用的 `options` 生效。
    pub async fn read_graph(&self, options: ParseOptions) -> Result<Arc<F::Graph>, HandlerError> {
        let materialization = self
            .graph
            .lock()
            .get_or_insert_with(|| self.materialize(options))
            .clone();
        materialization.await
    }

    /// 是否已经完成物化（无论成败）。
    pub fn is_materialized(&self) -> bool {
        self.graph
            .lock()
            .as_ref()
            .is_some_and(|materialization| materialization.peek().is_some())
    }

    fn materialize(&self, options: ParseOptions) -> Materialization<F::Graph> {
        let elements = self.parse(options);
        let graph = self.config.factory.create();
        let media_type = self.media_type.clone();
        async move {
            match collect_into(graph, elements).await {
                Ok(graph) => {
                    debug!(
                        rdf.handler.media_type = %media_type,
                        rdf.handler.elements = graph.len(),
                        "request graph materialized"
                    );
                    Ok(Arc::new(graph))
                }
                Err(error) => {
                    let error = HandlerError::from_read_fault(&media_type, error);
                    warn!(
                        rdf.handler.media_type = %media_type,
                        rdf.handler.error_code = error.code(),
                        error = %error,
                        "request graph could not be materialized"
                    );
                    Err(error)
                }
            }
        }
        .boxed()
        .shared()
    }

    fn parse(&self, options: ParseOptions) -> ElementStream {
        let Some(body) = self.body.lock().take() else {
            return fault(CodecError::new(
                codes::BODY_CONSUMED,
                "request body was already consumed by an earlier read",
            ));
        };
        let config = Arc::clone(&self.config);
        let meta = Arc::clone(&self.meta);
        let media_type = self.media_type.clone();
        DeferredElementStream::new(async move {
            let mut options = options;
            if options.base_iri.is_none() {
                options.base_iri = config.base_iri.resolve(&meta).await?;
            }
            debug!(
                rdf.handler.media_type = %media_type,
                rdf.handler.stage = "parse",
                base_iri = options.base_iri.as_deref().unwrap_or_default(),
                "parsing request body"
            );
            Ok::<_, CodecError>(config.codecs.import_parse(
                &media_type,
                body.into_byte_stream(),
                options,
            ))
        })
        .boxed()
    }
}

impl<F: GraphFactory> fmt::Debug for RequestReader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestReader")
            .field("media_type", &self.media_type)
            .field("body_available", &self.body.lock().is_some())
            .field("materialized", &self.is_materialized())
            .finish()
    }
}
