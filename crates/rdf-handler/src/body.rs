use std::{error::Error, fmt};

use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt, stream};

use crate::{
    error::{CodecError, codes},
    stream::ByteStream,
};

/// 请求体来源。
///
/// # 教案式说明
/// - **意图（Why）**：宿主可能已把请求体完整缓冲，也可能只给出分块流；解析器统一消费 [`ByteStream`]，
///   两种来源都在这里收敛；
/// - **契约（What）**：请求体只能被消费一次；`Streaming` 的读取故障被映射为 `body.read_failed`
///   并交给解析器所在的流。
#[derive(Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Full(Bytes),
    Streaming(ByteStream),
}

impl RequestBody {
    /// 由任意字节块流构造，底层错误包装为 [`CodecError`]。
    pub fn from_stream<S, B, E>(body: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: Into<Bytes> + 'static,
        E: Error + Send + Sync + 'static,
    {
        Self::Streaming(
            body.map_ok(Into::into)
                .map_err(|error| {
                    CodecError::new(codes::BODY_READ, "failed to read request body").with_cause(error)
                })
                .boxed(),
        )
    }

    /// 是否可以确定请求体为空；流式请求体在读完前无法判定，返回 `false`。
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Full(bytes) => bytes.is_empty(),
            Self::Streaming(_) => false,
        }
    }

    /// 转换为供解析器消费的字节流。
    pub fn into_byte_stream(self) -> ByteStream {
        match self {
            Self::Empty => stream::empty().boxed(),
            Self::Full(bytes) => stream::iter([Ok(bytes)]).boxed(),
            Self::Streaming(body) => body,
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Full(bytes)
    }
}

impl From<&'static str> for RequestBody {
    fn from(text: &'static str) -> Self {
        Self::Full(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Full(Bytes::from(text))
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Full(Bytes::from(bytes))
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Self::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emptiness_is_known_only_for_buffered_bodies() {
        assert!(RequestBody::Empty.is_empty());
        assert!(RequestBody::from(Bytes::new()).is_empty());
        assert!(!RequestBody::from("x").is_empty());
        let streaming = RequestBody::from_stream(stream::empty::<Result<Bytes, std::io::Error>>());
        assert!(!streaming.is_empty());
    }

    #[tokio::test]
    async fn stream_faults_become_body_read_errors() {
        let body = RequestBody::from_stream(stream::iter([
            Ok(Bytes::from_static(b"<a> ")),
            Err(std::io::Error::other("connection reset")),
        ]));
        let mut chunks = body.into_byte_stream();
        assert_eq!(
            chunks.next().await.expect("chunk").expect("ok"),
            Bytes::from_static(b"<a> ")
        );
        let error = chunks.next().await.expect("item").expect_err("fault");
        assert_eq!(error.code(), codes::BODY_READ);
        assert!(error.source().is_some());
    }
}
