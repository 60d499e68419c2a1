use std::{borrow::Cow, fmt};

use http::{HeaderMap, HeaderValue, header::InvalidHeaderValue};

/// `MediaType` 是编解码目录的查找键，也是协商结果的载体。
///
/// # 设计背景（Why）
/// - 与 HTTP `Content-Type` 一样以 IANA `type/subtype` 标识负载语义；
/// - 请求头中的取值常带大小写差异与 `; charset=` 等参数，查找前必须归一化，否则
///   `Application/N-Triples; charset=UTF-8` 会错过 `application/n-triples` 的解析器。
///
/// # 逻辑解析（How）
/// - [`parse`](Self::parse) 去掉参数、去除首尾空白并转为小写，同时校验两段均为 RFC 7230 `token`；
/// - [`from_static`](Self::from_static) 供常量使用，调用方保证字面量已是归一化形式。
///
/// # 契约说明（What）
/// - 实例内部始终为 `type/subtype` 小写形式，不含参数；
/// - 通配形式（`*/*`、`type/*`）同样可表示，但只在 [`AcceptList`] 中出现。
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MediaType(Cow<'static, str>);

impl MediaType {
    /// N-Triples。
    pub const N_TRIPLES: MediaType = MediaType::from_static("application/n-triples");
    /// N-Quads。
    pub const N_QUADS: MediaType = MediaType::from_static("application/n-quads");
    /// Turtle。
    pub const TURTLE: MediaType = MediaType::from_static("text/turtle");
    /// JSON-LD。
    pub const JSON_LD: MediaType = MediaType::from_static("application/ld+json");

    /// 以静态字面量构造，不做归一化。
    pub const fn from_static(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }

    /// 解析并归一化媒体类型字符串；空串或非法格式返回 `None`。
    pub fn parse(raw: &str) -> Option<Self> {
        let essence = raw.split(';').next().unwrap_or_default().trim();
        let (ty, subtype) = essence.split_once('/')?;
        let (ty, subtype) = (ty.trim(), subtype.trim());
        if !is_token(ty) || !is_token(subtype) {
            return None;
        }
        Some(Self(Cow::Owned(format!(
            "{}/{}",
            ty.to_ascii_lowercase(),
            subtype.to_ascii_lowercase()
        ))))
    }

    /// 从 `Content-Type` 之类的头值解析。
    pub fn from_header(value: &HeaderValue) -> Option<Self> {
        value.to_str().ok().and_then(Self::parse)
    }

    /// 返回底层字符串表示。
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 主类型，如 `application`。
    pub fn type_(&self) -> &str {
        self.0.split_once('/').map(|(ty, _)| ty).unwrap_or(&self.0)
    }

    /// 子类型，如 `n-triples`。
    pub fn subtype(&self) -> &str {
        self.0.split_once('/').map(|(_, sub)| sub).unwrap_or_default()
    }

    /// 是否包含通配段。
    pub fn is_wildcard(&self) -> bool {
        self.type_() == "*" || self.subtype() == "*"
    }

    /// 生成带显式 UTF-8 字符集参数的 `Content-Type` 头值。
    pub fn content_type_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&format!("{}; charset=utf-8", self.0))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|byte| {
            byte.is_ascii_alphanumeric()
                || matches!(
                    byte,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

/// `Accept` 头中的单个媒体范围。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaRange {
    media_type: MediaType,
    /// 千分制权重，`q=0.5` 记为 500。
    quality: u16,
    /// 在头部中的出现顺序。
    position: usize,
}

impl MediaRange {
    /// 媒体范围本身（可能是通配）。
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    /// 千分制权重。
    pub fn quality(&self) -> u16 {
        self.quality
    }

    /// 在 `Accept` 头中的位置。
    pub fn position(&self) -> usize {
        self.position
    }

    /// 具体度：精确匹配 2，`type/*` 为 1，`*/*` 为 0。
    pub fn specificity(&self) -> u8 {
        match (self.media_type.type_(), self.media_type.subtype()) {
            ("*", _) => 0,
            (_, "*") => 1,
            _ => 2,
        }
    }

    fn matches(&self, candidate: &MediaType) -> bool {
        match self.specificity() {
            0 => true,
            1 => self.media_type.type_() == candidate.type_(),
            _ => self.media_type == *candidate,
        }
    }
}

/// 客户端的有序偏好列表，由一个或多个 `Accept` 头解析而来。
///
/// # 教案式说明
/// - **意图（Why）**：协商器只关心“范围 + 权重 + 顺序”，把头部解析集中在此处，避免在读写路径重复处理；
/// - **结构（How）**：逐个逗号分隔的条目解析媒体范围与 `q` 参数，非法条目直接忽略，
///   与 RFC 9110 对无法识别条目的处理保持一致；
/// - **契约（What）**：`position` 反映条目在全部 `Accept` 头中的顺序，供同权重时打破平局。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AcceptList {
    ranges: Vec<MediaRange>,
    raw: String,
}

impl AcceptList {
    /// 解析单个头部字符串。
    pub fn parse(header: &str) -> Self {
        let ranges = header
            .split(',')
            .filter_map(parse_range)
            .enumerate()
            .map(|(position, (media_type, quality))| MediaRange {
                media_type,
                quality,
                position,
            })
            .collect();
        Self {
            ranges,
            raw: header.trim().to_owned(),
        }
    }

    /// 合并请求中的全部 `Accept` 头。
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let joined = headers
            .get_all(http::header::ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        Self::parse(&joined)
    }

    /// 按头部顺序排列的媒体范围。
    pub fn ranges(&self) -> &[MediaRange] {
        &self.ranges
    }

    /// 原始头部文本，用于错误信息。
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// 是否没有任何有效条目。
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// 找出对 `candidate` 最具体的匹配范围。
    pub fn best_match(&self, candidate: &MediaType) -> Option<&MediaRange> {
        self.ranges
            .iter()
            .filter(|range| range.matches(candidate))
            .max_by(|left, right| {
                left.specificity()
                    .cmp(&right.specificity())
                    .then_with(|| right.position.cmp(&left.position))
            })
    }
}

fn parse_range(entry: &str) -> Option<(MediaType, u16)> {
    let mut parts = entry.split(';');
    let media_type = MediaType::parse(parts.next()?)?;
    let mut quality = 1000;
    for param in parts {
        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("q") {
            quality = parse_quality(value.trim())?;
        }
    }
    Some((media_type, quality))
}

fn parse_quality(value: &str) -> Option<u16> {
    let (int, frac) = value.split_once('.').unwrap_or((value, ""));
    if frac.len() > 3 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let scaled = match int {
        "0" => {
            let mut digits = frac.to_owned();
            while digits.len() < 3 {
                digits.push('0');
            }
            digits.parse::<u16>().ok()?
        }
        "1" if frac.bytes().all(|b| b == b'0') => 1000,
        _ => return None,
    };
    Some(scaled)
}
