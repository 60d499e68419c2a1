//! 媒体类型协商器。
//!
//! # 教案式说明
//! - **意图（Why）**：响应方向需要在“显式覆盖 → 候选列表 → 客户端偏好 → 默认值”之间做出唯一决定，
//!   请求方向则只需确认声明的媒体类型有解析器可用；两者都是纯函数，集中在此便于属性测试；
//! - **逻辑（How）**：[`negotiate`] 逐级尝试，每一级只接受精确命中的媒体范围，通配范围
//!   （`*/*`、`type/*`）永远不会单独选中某个已注册类型；
//! - **契约（What）**：结果必然来自 `explicit`、`candidates`、`supported` 或 `default` 之一，
//!   `None` 即协商失败，由调用方映射为 406。

use http::HeaderMap;
use serde::Deserialize;

use crate::{
    codec::CodecDirectory,
    media_type::{AcceptList, MediaType},
};

/// 显式覆盖的信任策略。
///
/// - `Trust`：覆盖值与候选值原样使用，即便目录中没有对应序列化器；失败延后到序列化流中暴露；
/// - `Validate`：覆盖值、候选值与默认值都必须出现在序列化器目录中，否则视为未给出。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridePolicy {
    #[default]
    Trust,
    Validate,
}

/// 一次协商所需的全部输入。
#[derive(Clone, Copy, Debug)]
pub struct NegotiationRequest<'a> {
    /// 调用方或响应通道预设的覆盖值，已归一化。
    pub explicit: Option<&'a MediaType>,
    /// 客户端偏好。
    pub accept: &'a AcceptList,
    /// 调用方限定的候选媒体类型，按偏好排列。
    pub candidates: &'a [MediaType],
    /// 目录中可用的序列化器媒体类型，按注册顺序排列。
    pub supported: &'a [MediaType],
    /// 配置的默认媒体类型。
    pub default: Option<&'a MediaType>,
    pub policy: OverridePolicy,
}

/// 协商结果来自哪一级。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Override,
    Candidate,
    Accept,
    Default,
}

/// 协商成功的结果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Negotiated {
    pub media_type: MediaType,
    pub resolution: Resolution,
}

/// 响应方向协商。
pub fn negotiate(request: &NegotiationRequest<'_>) -> Option<Negotiated> {
    let trusted = |media_type: &MediaType| match request.policy {
        OverridePolicy::Trust => true,
        OverridePolicy::Validate => request.supported.contains(media_type),
    };

    if let Some(explicit) = request.explicit
        && trusted(explicit)
    {
        return Some(Negotiated {
            media_type: explicit.clone(),
            resolution: Resolution::Override,
        });
    }

    let candidates: Vec<&MediaType> = request.candidates.iter().filter(|&c| trusted(c)).collect();
    if let Some(media_type) = select(request.accept, candidates) {
        return Some(Negotiated {
            media_type: media_type.clone(),
            resolution: Resolution::Candidate,
        });
    }

    if let Some(media_type) = select(request.accept, request.supported.iter().collect()) {
        return Some(Negotiated {
            media_type: media_type.clone(),
            resolution: Resolution::Accept,
        });
    }

    request
        .default
        .filter(|&default| trusted(default))
        .map(|default| Negotiated {
            media_type: default.clone(),
            resolution: Resolution::Default,
        })
}

/// 在 `pool` 中挑选客户端最偏好的媒体类型。
///
/// 没有任何有效 `Accept` 条目时视作客户端不设限，取池中第一个；否则只有被精确范围命中且 `q > 0`
/// 的类型才有资格，依次按权重、条目顺序、池内顺序决出。
fn select<'m>(accept: &AcceptList, pool: Vec<&'m MediaType>) -> Option<&'m MediaType> {
    if accept.is_empty() {
        return pool.first().copied();
    }
    pool.into_iter()
        .enumerate()
        .filter_map(|(index, media_type)| {
            let range = accept.best_match(media_type)?;
            (range.specificity() == 2 && range.quality() > 0)
                .then_some((range.quality(), range.position(), index, media_type))
        })
        .max_by(|left, right| {
            left.0
                .cmp(&right.0)
                .then_with(|| right.1.cmp(&left.1))
                .then_with(|| right.2.cmp(&left.2))
        })
        .map(|(_, _, _, media_type)| media_type)
}

/// 请求方向：确定用于解析请求体的媒体类型。
///
/// 声明了 `Content-Type` 则以其为准（无法解析时视为不支持）；未声明则退回默认值。结果必须有解析器，
/// 否则返回 `None`，读取能力不会被安装。
pub fn resolve_request_media_type(
    headers: &HeaderMap,
    default: Option<&MediaType>,
    codecs: &dyn CodecDirectory,
) -> Option<MediaType> {
    let media_type = match headers.get(http::header::CONTENT_TYPE) {
        Some(value) => MediaType::from_header(value)?,
        None => default?.clone(),
    };
    codecs.has_parser(&media_type).then_some(media_type)
}
