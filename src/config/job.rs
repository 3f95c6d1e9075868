use serde::Deserialize;

use crate::codec::jpeg2000::CodecChoice;

#[derive(Debug, Clone, Deserialize)]
pub struct JobFile {
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    /// Directory of page images.
    pub images: String,
    /// OCR layout JSON.
    pub layout: String,
    /// Output directory for artifacts and the manifest.
    pub output: String,
    /// 1-based source pages to leave out entirely.
    #[serde(default, deserialize_with = "deserialize_optional_pages")]
    pub skip_pages: Option<Vec<u32>>,
    /// Comma list of output pages to render in high quality.
    #[serde(default, deserialize_with = "deserialize_optional_hq_pages")]
    pub hq_pages: Option<Vec<i64>>,
    pub stop_after: Option<usize>,
    pub jbig2: Option<bool>,
    pub codec: Option<CodecChoice>,
    pub bg_slope: Option<u32>,
    pub fg_slope: Option<u32>,
    pub downsample: Option<u32>,
    pub bg_downsample: Option<u32>,
    pub denoise_mask: Option<bool>,
    pub grayscale: Option<bool>,
}

/// ページ範囲文字列をパースしてページ番号のベクタに変換する。
///
/// 形式:
/// - 単一ページ: `"5"`
/// - 範囲: `"5-10"` (5, 6, 7, 8, 9, 10)
/// - 混合（カンマ区切り）: `"1, 3, 5-10, 15"`
///
/// 結果はソート済み・重複なし。
pub fn parse_page_range(s: &str) -> crate::error::Result<Vec<u32>> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(crate::error::MrcError::config("Page range cannot be empty"));
    }

    let mut pages = Vec::new();

    for part in trimmed.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start_str, end_str)) = part.split_once('-') {
            let start: u32 = start_str.trim().parse().map_err(|_| {
                crate::error::MrcError::config(format!(
                    "Invalid page number in range: '{start_str}'"
                ))
            })?;
            let end: u32 = end_str.trim().parse().map_err(|_| {
                crate::error::MrcError::config(format!("Invalid page number in range: '{end_str}'"))
            })?;

            if start > end {
                return Err(crate::error::MrcError::config(format!(
                    "Invalid page range: start ({start}) > end ({end})"
                )));
            }

            for page in start..=end {
                pages.push(page);
            }
        } else {
            let page: u32 = part.parse().map_err(|_| {
                crate::error::MrcError::config(format!("Invalid page number: '{part}'"))
            })?;
            pages.push(page);
        }
    }

    if pages.is_empty() {
        return Err(crate::error::MrcError::config("Page range resolved to empty set"));
    }
    if pages.contains(&0) {
        return Err(crate::error::MrcError::config("Page numbers are 1-based"));
    }

    pages.sort();
    pages.dedup();
    Ok(pages)
}

/// HQページ指定をパースする。
///
/// 正の数は1始まりのページ番号、負の数は末尾からの位置 (`-1` が最終ページ)。
/// 範囲外の値はここでは検証せず、ページ数が分かった時点で無視される。
pub fn parse_hq_pages(s: &str) -> crate::error::Result<Vec<i64>> {
    let mut pages = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let page: i64 = part.parse().map_err(|_| {
            crate::error::MrcError::config(format!("Invalid HQ page number: '{part}'"))
        })?;
        pages.push(page);
    }
    Ok(pages)
}

/// serdeのdeserialize_withで使用するページ範囲デシリアライザ
fn deserialize_optional_pages<'de, D>(deserializer: D) -> Result<Option<Vec<u32>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) => parse_page_range(&s).map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

fn deserialize_optional_hq_pages<'de, D>(deserializer: D) -> Result<Option<Vec<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<HqPagesField>::deserialize(deserializer)? {
        Some(HqPagesField::Text(s)) => parse_hq_pages(&s).map(Some).map_err(serde::de::Error::custom),
        Some(HqPagesField::Single(n)) => Ok(Some(vec![n])),
        Some(HqPagesField::List(v)) => Ok(Some(v)),
        None => Ok(None),
    }
}

/// YAMLでは `3`, `"1,2,-1"`, `[1, 2, -1]` のいずれも受け付ける。
#[derive(Deserialize)]
#[serde(untagged)]
enum HqPagesField {
    Single(i64),
    List(Vec<i64>),
    Text(String),
}
