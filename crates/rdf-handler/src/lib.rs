//! # rdf-handler
//!
//! ## 定位与职责（Why）
//! - 在 HTTP 处理器与 RDF 编解码器之间承担两件事：按声明的媒体类型解析请求图，按 `Accept` 协商并序列化响应图；
//! - 处理器只与图和元素流打交道，媒体类型、基准 IRI 与响应头顺序都由中间件负责。
//!
//! ## 架构嵌入（Where）
//! - [`negotiation`]：纯函数协商器，决定响应媒体类型与请求解析类型；
//! - [`incoming`] / [`outgoing`]：读取与写出管线，分别产出 [`RequestReader`] 与 [`ResponseWriter`]；
//! - [`exchange`]：[`RdfHandler`] 把两者装配成 [`RdfExchange`] 并挂到 `http::Extensions`；
//! - [`codec`]、[`sink`]、[`body`]：与编解码目录、响应出口、请求体来源之间的边界。
//!
//! ## 契约（What）
//! - 写出能力总是安装；读取能力仅在请求体非空且媒体类型有解析器时安装；
//! - 物化读取只解析一次，结果（包括失败）被记住；
//! - 协商失败在任何副作用之前以 406 语义返回。
//!
//! ## 风险提示（Trade-offs）
//! - 本 crate 不内置任何 RDF 语法，需要搭配 `rdf-codec-ntriples` 之类的编解码扩展；
//! - 项、四元组与数据集直接复用 `oxrdf`，编解码扩展与宿主共享同一套类型。

pub mod body;
pub mod codec;
pub mod config;
pub mod error;
pub mod exchange;
pub mod incoming;
pub mod media_type;
pub mod model;
pub mod negotiation;
pub mod outgoing;
pub mod sink;
pub mod stream;

pub use body::RequestBody;
pub use codec::{CodecDirectory, CodecMap, ParseOptions, Parser, SerializeOptions, Serializer};
pub use config::{
    BaseIriMode, BaseIriPolicy, BaseIriResolver, ConfigError, MiddlewareDescriptor,
    RdfHandlerConfig, RdfHandlerSettings, RequestMeta,
};
pub use error::{CodecError, ErrorCause, HandlerError, SinkError, codes};
pub use exchange::{RdfAttached, RdfExchange, RdfHandler};
pub use incoming::RequestReader;
pub use media_type::{AcceptList, MediaRange, MediaType};
pub use model::{
    BlankNode, Dataset, DatasetFactory, Graph, GraphFactory, GraphName, Literal, NamedNode,
    NamedOrBlankNode, Quad, Term, Triple, into_default_graph,
};
pub use negotiation::{Negotiated, NegotiationRequest, OverridePolicy, Resolution, negotiate};
pub use outgoing::{ResponseWriter, WriteOptions};
pub use sink::{ChannelSink, MemorySink, MemorySnapshot, PendingResponse, ResponseBody, ResponseSink};
pub use stream::{ByteStream, DeferredElementStream, ElementStream};
