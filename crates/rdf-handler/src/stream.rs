//! 元素流与字节流的公共类型和组合子。
//!
//! # 教案式说明
//! - **意图（Why）**：读取能力必须“立即返回一个流”，而真正的准备工作（计算基准 IRI、定位解析器）
//!   可能是异步的；把这段准备显式建模为流的第一阶段，比在调用处阻塞或额外返回 `Future` 更容易组合；
//! - **结构（How）**：[`DeferredElementStream`] 是三态机：`Pending` 驱动准备 `Future`，成功后切换到
//!   `Producing` 逐项转发，准备失败则产出一次 `Err` 后进入 `Done`；
//! - **契约（What）**：所有故障都以流内 `Err` 项出现；流被拉取时才推进，天然遵循消费者背压。

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::{
    FutureExt, Stream, StreamExt, TryStreamExt,
    future::BoxFuture,
    stream::{self, BoxStream, FusedStream},
};

use crate::{
    error::CodecError,
    model::{Graph, Quad, into_default_graph},
};

/// 惰性、单次遍历的元素流。
pub type ElementStream = BoxStream<'static, Result<Quad, CodecError>>;

/// 请求体或序列化输出的字节块流。
pub type ByteStream = BoxStream<'static, Result<Bytes, CodecError>>;

/// 只产出一个故障的元素流。
pub fn fault(error: CodecError) -> ElementStream {
    stream::iter([Err(error)]).boxed()
}

/// 只产出一个故障的字节流。
pub fn byte_fault(error: CodecError) -> ByteStream {
    stream::iter([Err(error)]).boxed()
}

/// 丢弃每个元素的图名，投影为三元组流。
pub fn project_to_triples(elements: ElementStream) -> ElementStream {
    elements.map_ok(into_default_graph).boxed()
}

/// 把元素流折叠进 `graph`，遇到第一个故障即停止。
pub async fn collect_into<G: Graph>(graph: G, elements: ElementStream) -> Result<G, CodecError> {
    elements
        .try_fold(graph, |mut graph, quad| async move {
            graph.insert(quad);
            Ok(graph)
        })
        .await
}

enum Phase {
    Pending(BoxFuture<'static, Result<ElementStream, CodecError>>),
    Producing(ElementStream),
    Done,
}

/// 两阶段元素流：先完成准备，再转发解析结果。
pub struct DeferredElementStream {
    phase: Phase,
}

impl DeferredElementStream {
    /// 以准备 `Future` 构造；`Future` 在首次拉取时才开始执行。
    pub fn new<F>(setup: F) -> Self
    where
        F: Future<Output = Result<ElementStream, CodecError>> + Send + 'static,
    {
        Self {
            phase: Phase::Pending(setup.boxed()),
        }
    }

    /// 是否仍停留在准备阶段。
    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Pending(_))
    }
}

impl Stream for DeferredElementStream {
    type Item = Result<Quad, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.phase {
                Phase::Pending(setup) => match setup.as_mut().poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Ok(elements)) => this.phase = Phase::Producing(elements),
                    Poll::Ready(Err(error)) => {
                        this.phase = Phase::Done;
                        return Poll::Ready(Some(Err(error)));
                    }
                },
                Phase::Producing(elements) => {
                    return match elements.poll_next_unpin(cx) {
                        Poll::Ready(None) => {
                            this.phase = Phase::Done;
                            Poll::Ready(None)
                        }
                        other => other,
                    };
                }
                Phase::Done => return Poll::Ready(None),
            }
        }
    }
}

impl FusedStream for DeferredElementStream {
    fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }
}

impl fmt::Debug for DeferredElementStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self.phase {
            Phase::Pending(_) => "pending",
            Phase::Producing(_) => "producing",
            Phase::Done => "done",
        };
        f.debug_struct("DeferredElementStream")
            .field("phase", &phase)
            .finish()
    }
}
