//! 响应通道：写出管线把协商结果与序列化字节交给宿主的出口。
//!
//! # 设计背景（Why）
//! - 中间件不拥有连接，只需要“设置头、逐块发送、结束”三类动作；抽象为 [`ResponseSink`] 后，
//!   宿主可以对接任意 HTTP 服务端，测试可以使用内存实现；
//! - HTTP 语义要求响应头在首个字节之前提交，之后媒体类型不可再改，通道负责守住这一顺序。
//!
//! # 逻辑解析（How）
//! - [`ChannelSink`] 把响应头经 `oneshot` 交给 [`PendingResponse`]，响应体经有界 `mpsc` 逐块传递，
//!   `send` 在通道满时挂起，形成端到端背压；
//! - [`MemorySink`] 把全部写入记录在共享状态中，可配置在第 N 块时失败以模拟传输故障。
//!
//! # 契约说明（What）
//! - 头部在首次 `send` 或 `finish` 时提交，之后 `set_content_type` 返回 [`SinkError::HeadCommitted`]；
//! - 接收端被丢弃后的写入返回 [`SinkError::Closed`]，[`ResponseSink::closed`] 随之完成；
//! - 写出失败时调用 [`ResponseSink::abort`]：未提交的头部不再提交，已开始的响应体以
//!   [`SinkError::Aborted`] 结束，接收端不会把截断内容当作完整响应。

use std::{
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, future};
use http::{HeaderMap, HeaderValue, Response, StatusCode, header::CONTENT_TYPE};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::SinkError;

/// 响应出口。
#[async_trait]
pub trait ResponseSink: Send + 'static {
    /// 当前（可能由宿主预设的）`Content-Type`。
    fn content_type(&self) -> Option<HeaderValue>;

    /// 设置 `Content-Type`；头部提交后调用返回 [`SinkError::HeadCommitted`]。
    fn set_content_type(&mut self, value: HeaderValue) -> Result<(), SinkError>;

    /// 发送一个响应体字节块，首次调用会提交头部。
    async fn send(&mut self, chunk: Bytes) -> Result<(), SinkError>;

    /// 结束响应体；尚未提交的头部随之提交。
    async fn finish(&mut self) -> Result<(), SinkError>;

    /// 接收端不再消费时完成；默认实现永不完成。
    async fn closed(&mut self) {
        future::pending::<()>().await
    }

    /// 放弃本次响应，之后的写入返回 [`SinkError::Closed`]。
    fn abort(&mut self) {}
}

type Head = (StatusCode, HeaderMap);

/// 基于 `tokio` 通道的响应出口。
#[derive(Debug)]
pub struct ChannelSink {
    status: StatusCode,
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<Head>>,
    body_tx: Option<mpsc::Sender<Bytes>>,
    aborted: Arc<AtomicBool>,
}

impl ChannelSink {
    /// 创建出口与对应的待完成响应；`capacity` 为在途字节块上限，至少为 1。
    pub fn new(capacity: usize) -> (Self, PendingResponse) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(capacity.max(1));
        let aborted = Arc::new(AtomicBool::new(false));
        let sink = Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            head_tx: Some(head_tx),
            body_tx: Some(body_tx),
            aborted: Arc::clone(&aborted),
        };
        let body = ResponseBody {
            body_rx,
            aborted,
            reported: false,
        };
        (sink, PendingResponse { head_rx, body })
    }

    /// 提交前可修改的响应头，宿主可借此预设 `Content-Type`。
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn is_committed(&self) -> bool {
        self.head_tx.is_none()
    }

    fn commit(&mut self) -> Result<(), SinkError> {
        if let Some(head_tx) = self.head_tx.take() {
            head_tx
                .send((self.status, std::mem::take(&mut self.headers)))
                .map_err(|_| SinkError::Closed)?;
        }
        Ok(())
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    fn content_type(&self) -> Option<HeaderValue> {
        self.headers.get(CONTENT_TYPE).cloned()
    }

    fn set_content_type(&mut self, value: HeaderValue) -> Result<(), SinkError> {
        if self.is_committed() {
            return Err(SinkError::HeadCommitted);
        }
        self.headers.insert(CONTENT_TYPE, value);
        Ok(())
    }

    async fn send(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        self.commit()?;
        let body_tx = self.body_tx.as_ref().ok_or(SinkError::Closed)?;
        body_tx.send(chunk).await.map_err(|_| SinkError::Closed)
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        if self.aborted.load(Ordering::Acquire) {
            return Err(SinkError::Closed);
        }
        self.commit()?;
        self.body_tx = None;
        Ok(())
    }

    async fn closed(&mut self) {
        match &self.body_tx {
            Some(body_tx) => body_tx.closed().await,
            None => future::pending().await,
        }
    }

    fn abort(&mut self) {
        // 先置位再释放发送端，接收端观察到通道关闭时一定能看到标记。
        self.aborted.store(true, Ordering::Release);
        self.head_tx = None;
        self.body_tx = None;
    }
}

/// [`ChannelSink`] 的接收端。
#[derive(Debug)]
pub struct PendingResponse {
    head_rx: oneshot::Receiver<Head>,
    body: ResponseBody,
}

impl PendingResponse {
    /// 等待头部提交后构造 `http::Response`；出口在提交前被丢弃或放弃时返回 [`SinkError::Closed`]。
    pub async fn into_response(self) -> Result<Response<ResponseBody>, SinkError> {
        let (status, headers) = self.head_rx.await.map_err(|_| SinkError::Closed)?;
        let mut response = Response::new(self.body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// 流式响应体；写出方放弃响应时以一个 [`SinkError::Aborted`] 项结束。
#[derive(Debug)]
pub struct ResponseBody {
    body_rx: mpsc::Receiver<Bytes>,
    aborted: Arc<AtomicBool>,
    reported: bool,
}

impl ResponseBody {
    /// 读取全部剩余字节；响应被放弃时返回错误。
    pub async fn collect_bytes(mut self) -> Result<Bytes, SinkError> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }
}

impl Stream for ResponseBody {
    type Item = Result<Bytes, SinkError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.body_rx.poll_recv(cx) {
            Poll::Ready(Some(chunk)) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(None) if !this.reported && this.aborted.load(Ordering::Acquire) => {
                this.reported = true;
                Poll::Ready(Some(Err(SinkError::Aborted)))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// [`MemorySink`] 记录的状态快照。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
    pub chunks: usize,
    pub committed: bool,
    pub finished: bool,
    pub aborted: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    content_type: Option<HeaderValue>,
    body: BytesMut,
    chunks: usize,
    committed: bool,
    finished: bool,
    aborted: bool,
}

/// 内存响应出口，克隆体共享同一份状态。
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
    fail_at: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预设 `Content-Type`，模拟宿主在中间件之前已选定媒体类型。
    pub fn with_content_type(self, value: HeaderValue) -> Self {
        self.state.lock().content_type = Some(value);
        self
    }

    /// 在第 `index` 个字节块（从 0 计）发送时失败。
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        let state = self.state.lock();
        MemorySnapshot {
            content_type: state.content_type.clone(),
            body: Bytes::copy_from_slice(&state.body),
            chunks: state.chunks,
            committed: state.committed,
            finished: state.finished,
            aborted: state.aborted,
        }
    }
}

#[async_trait]
impl ResponseSink for MemorySink {
    fn content_type(&self) -> Option<HeaderValue> {
        self.state.lock().content_type.clone()
    }

    fn set_content_type(&mut self, value: HeaderValue) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if state.committed {
            return Err(SinkError::HeadCommitted);
        }
        state.content_type = Some(value);
        Ok(())
    }

    async fn send(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if state.aborted {
            return Err(SinkError::Closed);
        }
        state.committed = true;
        if self.fail_at == Some(state.chunks) {
            return Err(SinkError::Transport("injected failure".into()));
        }
        state.chunks += 1;
        state.body.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), SinkError> {
        let mut state = self.state.lock();
        if state.aborted {
            return Err(SinkError::Closed);
        }
        state.committed = true;
        state.finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.state.lock().aborted = true;
    }
}
