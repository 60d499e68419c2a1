use std::{borrow::Cow, error::Error, fmt, sync::Arc};

use http::StatusCode;
use thiserror::Error;

use crate::media_type::MediaType;

/// 稳定错误码命名空间。
///
/// # 教案式说明
/// - **意图（Why）**：日志、指标与宿主的错误映射都依赖稳定字符串，而非解析 `Display` 文案；
/// - **契约（What）**：码值遵循 `<域>.<语义>` 约定，一经发布不得改名；
/// - **风险提示（Trade-offs）**：自定义编解码器可使用自有码值，但 `rdf.handler.*` 前缀保留给本 crate。
pub mod codes {
    /// 响应协商失败：没有可用的序列化媒体类型。
    pub const NOT_ACCEPTABLE: &str = "rdf.handler.not_acceptable";
    /// 请求声明的媒体类型没有对应解析器。
    pub const UNSUPPORTED_MEDIA_TYPE: &str = "rdf.handler.unsupported_media_type";
    /// 解析器在读取请求体时报告故障。
    pub const PARSE: &str = "rdf.handler.parse";
    /// 序列化器在写出响应体时报告故障。
    pub const SERIALIZE: &str = "rdf.handler.serialize";
    /// 响应通道独立于序列化器发生故障。
    pub const SINK: &str = "rdf.handler.sink";
    /// 基准 IRI 计算失败。
    pub const BASE_IRI: &str = "rdf.handler.base_iri";
    /// 请求体已被先前的读取消费。
    pub const BODY_CONSUMED: &str = "rdf.handler.body_consumed";
    /// 编解码目录中缺少对应媒体类型的实现。
    pub const CODEC_MISSING: &str = "codec.missing";
    /// 读取请求体字节流失败。
    pub const BODY_READ: &str = "body.read_failed";
}

/// `ErrorCause` 封装底层原因，保持 `Send + Sync` 以方便跨线程传递。
pub type ErrorCause = Box<dyn Error + Send + Sync + 'static>;

/// `CodecError` 是元素流与字节流故障通道中传递的错误形态。
///
/// # 设计背景（Why）
/// - 解析器、序列化器、请求体读取与基准 IRI 计算都通过流内 `Err` 项报告故障，需要一个跨编解码实现共享的最小结构；
/// - 结构保持最小：稳定错误码 + 人类可读消息 + 可选底层原因，便于日志聚合。
///
/// # 契约说明（What）
/// - `code`：`'static` 字符串，建议来自 [`codes`] 或编解码器自定义的 `<codec>.<reason>`；
/// - `message`：面向排障人员，不应包含请求体原文等敏感信息；
/// - `cause`：可选底层错误，通过 [`Error::source`] 暴露。
#[derive(Debug)]
pub struct CodecError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<ErrorCause>,
}

impl CodecError {
    /// 构造编解码错误。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带底层原因并返回新的错误。
    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 获取描述。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 获取底层原因。
    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|boxed| boxed.as_ref() as &(dyn Error + 'static))
    }
}

/// 响应通道故障。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    /// 接收端在响应体完成前被丢弃（客户端断开或宿主放弃）。
    #[error("response receiver dropped before the body completed")]
    Closed,
    /// 响应头已随首个字节提交，不能再修改。
    #[error("response head already committed")]
    HeadCommitted,
    /// 写出方在响应体完成前放弃了本次响应，已收到的字节是被截断的内容。
    #[error("response aborted before the body completed")]
    Aborted,
    /// 宿主传输层报告的其他故障。
    #[error("response transport failed: {0}")]
    Transport(Cow<'static, str>),
}

/// `HandlerError` 聚合四项能力方法对外暴露的全部失败路径。
///
/// # 教案式说明
/// - **意图 (Why)**：宿主需要把失败翻译为 HTTP 状态码；枚举变体直接对应 406/415/400/500 等处置，
///   避免调用方解析字符串；
/// - **契约 (What)**：
///   - 所有变体可 `Clone`（底层原因以 `Arc` 共享），使物化读取的记忆化结果能在多次调用间原样返回；
///   - [`status`](Self::status) 给出建议状态码，[`is_client_fault`](Self::is_client_fault) 区分客户端输入问题；
///   - [`code`](Self::code) 返回 [`codes`] 中的稳定码值；
/// - **执行逻辑 (How)**：协商失败在任何副作用之前构造；流中故障经由 [`from_read_fault`](Self::from_read_fault)
///   依据错误码归类；
/// - **设计权衡 (Trade-offs)**：`Parse` 与 `Serialize` 保留媒体类型上下文，代价是一次 `MediaType` 克隆。
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum HandlerError {
    /// 响应协商失败，宿主应回复 406。
    #[error("no serializer could be negotiated for accept `{accept}`")]
    NotAcceptable { accept: String },

    /// 请求声明的媒体类型没有解析器；仅在 `RdfExchange::require_reader` 中显式产生。
    #[error("no parser available for request media type `{media_type}`")]
    UnsupportedMediaType { media_type: String },

    /// 解析器报告故障，属于客户端输入问题。
    #[error("failed to parse `{media_type}` request body: {source}")]
    Parse {
        media_type: MediaType,
        source: Arc<CodecError>,
    },

    /// 基准 IRI 计算失败。
    #[error("failed to resolve base IRI: {source}")]
    BaseIri { source: Arc<CodecError> },

    /// 序列化器在接受请求后失败，属于服务端问题。
    #[error("failed to serialize `{media_type}` response body: {source}")]
    Serialize {
        media_type: MediaType,
        source: Arc<CodecError>,
    },

    /// 响应通道独立失败。
    #[error("response sink failed: {source}")]
    Sink { source: Arc<SinkError> },

    /// 请求体已被先前的流式读取消费。
    #[error("request body already consumed by an earlier read")]
    BodyConsumed,
}

impl HandlerError {
    /// 构造协商失败错误。
    pub fn not_acceptable(accept: impl Into<String>) -> Self {
        Self::NotAcceptable {
            accept: accept.into(),
        }
    }

    /// 将响应通道故障包装为处理器错误。
    pub fn sink(error: SinkError) -> Self {
        Self::Sink {
            source: Arc::new(error),
        }
    }

    /// 将读取路径上的流内故障归类。
    ///
    /// - `rdf.handler.base_iri` → [`HandlerError::BaseIri`]；
    /// - `rdf.handler.body_consumed` → [`HandlerError::BodyConsumed`]；
    /// - 其余一律视作解析故障。
    pub fn from_read_fault(media_type: &MediaType, error: CodecError) -> Self {
        match error.code() {
            codes::BASE_IRI => Self::BaseIri {
                source: Arc::new(error),
            },
            codes::BODY_CONSUMED => Self::BodyConsumed,
            _ => Self::Parse {
                media_type: media_type.clone(),
                source: Arc::new(error),
            },
        }
    }

    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAcceptable { .. } => codes::NOT_ACCEPTABLE,
            Self::UnsupportedMediaType { .. } => codes::UNSUPPORTED_MEDIA_TYPE,
            Self::Parse { .. } => codes::PARSE,
            Self::BaseIri { .. } => codes::BASE_IRI,
            Self::Serialize { .. } => codes::SERIALIZE,
            Self::Sink { .. } => codes::SINK,
            Self::BodyConsumed => codes::BODY_CONSUMED,
        }
    }

    /// 建议宿主回复的 HTTP 状态码。
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            Self::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Parse { .. } | Self::BaseIri { .. } => StatusCode::BAD_REQUEST,
            Self::Serialize { .. } | Self::Sink { .. } | Self::BodyConsumed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 是否属于客户端输入导致的故障（4xx）。
    pub fn is_client_fault(&self) -> bool {
        self.status().is_client_error()
    }
}
