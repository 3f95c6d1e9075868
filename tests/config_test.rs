// 設定ファイル解析テスト

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use mrc_recode::codec::jpeg2000::CodecChoice;
use mrc_recode::config::job::{JobFile, parse_hq_pages, parse_page_range};
use mrc_recode::config::merged::MergedConfig;
use mrc_recode::config::settings::Settings;
use mrc_recode::config::{load_job_file, load_settings_for_job, resolve_path};

const MINIMAL_JOB: &str = r#"
jobs:
  - images: "pages"
    layout: "layout.json"
    output: "out"
"#;

fn minimal_job_file() -> JobFile {
    serde_yml::from_str(MINIMAL_JOB).expect("parse job")
}

// ============================================================
// 1. ページ範囲パーサ
// ============================================================

#[test]
fn test_parse_page_range_single_range() {
    let result = parse_page_range("5-10").expect("should parse range");
    assert_eq!(result, vec![5, 6, 7, 8, 9, 10]);
}

#[test]
fn test_parse_page_range_mixed_sorted_dedup() {
    let result = parse_page_range("15, 3, 1, 5-7, 6").expect("should parse mixed");
    assert_eq!(result, vec![1, 3, 5, 6, 7, 15]);
}

#[test]
fn test_parse_page_range_invalid_text() {
    assert!(parse_page_range("abc").is_err());
}

#[test]
fn test_parse_page_range_reversed_range() {
    assert!(parse_page_range("10-5").is_err());
}

#[test]
fn test_parse_page_range_empty_string() {
    assert!(parse_page_range("").is_err());
}

#[test]
fn test_parse_page_range_rejects_zero() {
    assert!(parse_page_range("0-3").is_err(), "pages are 1-based");
}

#[test]
fn test_parse_hq_pages_allows_negative() {
    let pages = parse_hq_pages("1, 2,-1").expect("should parse");
    assert_eq!(pages, vec![1, 2, -1]);
    assert!(parse_hq_pages("x").is_err());
}

// ============================================================
// 2. Settings 構造体のデシリアライズ
// ============================================================

#[test]
fn test_settings_empty_yaml() {
    let settings = Settings::from_yaml("{}").expect("should use defaults for empty YAML");
    assert!(settings.jbig2);
    assert_eq!(settings.codec, CodecChoice::Kakadu);
    assert_eq!(settings.bg_slope, 47000);
    assert_eq!(settings.fg_slope, 49000);
    assert_eq!(settings.bg_ratio, 400);
    assert_eq!(settings.fg_psnr, 25);
    assert_eq!(settings.downsample, None);
    assert!(!settings.denoise_mask);
    assert!(!settings.grayscale);
    assert_eq!(settings.parallel_workers, 0);
    assert_eq!(settings.report_every, None);
}

#[test]
fn test_settings_full_yaml() {
    let yaml = r#"
jbig2: false
codec: openjpeg
bg_slope: 46000
fg_slope: 48000
hq_bg_slope: 44000
hq_fg_slope: 45000
bg_ratio: 300
fg_psnr: 30
downsample: 2
bg_downsample: 3
denoise_mask: true
grayscale: true
parallel_workers: 4
report_every: 10
reporter: "logger --tag mrc"
tmp_dir: "/tmp/mrc"
codec_timeout_secs: 120
tools:
  opj_compress: "/opt/openjpeg/bin/opj_compress"
"#;
    let settings = Settings::from_yaml(yaml).expect("should parse full YAML");
    assert!(!settings.jbig2);
    assert_eq!(settings.codec, CodecChoice::OpenJpeg);
    assert_eq!(settings.hq_bg_slope, 44000);
    assert_eq!(settings.hq_fg_slope, 45000);
    assert_eq!(settings.downsample, Some(2));
    assert_eq!(settings.bg_downsample, Some(3));
    assert!(settings.denoise_mask);
    assert!(settings.grayscale);
    assert_eq!(settings.parallel_workers, 4);
    assert_eq!(settings.report_every, Some(10));
    assert_eq!(settings.reporter.as_deref(), Some("logger --tag mrc"));
    assert_eq!(settings.tmp_dir.as_deref(), Some(Path::new("/tmp/mrc")));
    assert_eq!(settings.tools.opj_compress, "/opt/openjpeg/bin/opj_compress");
    // 未指定のツールはデフォルトのまま
    assert_eq!(settings.tools.jbig2, "jbig2");
}

#[test]
fn test_settings_unknown_codec_rejected() {
    assert!(Settings::from_yaml("codec: lurawave").is_err());
}

// ============================================================
// 3. Job 構造体のデシリアライズ
// ============================================================

#[test]
fn test_job_required_fields_only() {
    let job_file = minimal_job_file();
    assert_eq!(job_file.jobs.len(), 1);
    let job = &job_file.jobs[0];
    assert_eq!(job.images, "pages");
    assert_eq!(job.layout, "layout.json");
    assert_eq!(job.output, "out");
    assert!(job.skip_pages.is_none());
    assert!(job.hq_pages.is_none());
    assert!(job.stop_after.is_none());
    assert!(job.jbig2.is_none());
}

#[test]
fn test_job_missing_required_field() {
    let yaml = r#"
jobs:
  - images: "pages"
    output: "out"
"#;
    let result: Result<JobFile, _> = serde_yml::from_str(yaml);
    assert!(result.is_err(), "layout is required");
}

#[test]
fn test_job_page_selection_fields() {
    let yaml = r#"
jobs:
  - images: "pages"
    layout: "layout.json"
    output: "out"
    skip_pages: "1, 4-5"
    hq_pages: "1,-1"
    stop_after: 10
  - images: "pages"
    layout: "layout.json"
    output: "out2"
    hq_pages: [2, 3]
  - images: "pages"
    layout: "layout.json"
    output: "out3"
    hq_pages: -2
"#;
    let job_file: JobFile = serde_yml::from_str(yaml).expect("parse");
    assert_eq!(job_file.jobs[0].skip_pages, Some(vec![1, 4, 5]));
    assert_eq!(job_file.jobs[0].hq_pages, Some(vec![1, -1]));
    assert_eq!(job_file.jobs[0].stop_after, Some(10));
    assert_eq!(job_file.jobs[1].hq_pages, Some(vec![2, 3]));
    assert_eq!(job_file.jobs[2].hq_pages, Some(vec![-2]));
}

// ============================================================
// 4. 設定マージロジック
// ============================================================

#[test]
fn test_merge_job_overrides_settings() {
    let settings = Settings::from_yaml("bg_slope: 46000\njbig2: true").expect("parse settings");
    let job_yaml = r#"
jobs:
  - images: "pages"
    layout: "layout.json"
    output: "out"
    bg_slope: 45000
    jbig2: false
    codec: openjpeg
    grayscale: true
"#;
    let job_file: JobFile = serde_yml::from_str(job_yaml).expect("parse job");
    let merged = MergedConfig::new(&settings, &job_file.jobs[0]);
    assert_eq!(merged.bg_slope, 45000, "job bg_slope should override settings");
    assert!(!merged.jbig2);
    assert_eq!(merged.codec, CodecChoice::OpenJpeg);
    assert!(merged.grayscale, "job grayscale should override settings");
}

#[test]
fn test_merge_falls_back_to_settings() {
    let settings =
        Settings::from_yaml("fg_slope: 48500\ncodec_timeout_secs: 30").expect("parse settings");
    let merged = MergedConfig::new(&settings, &minimal_job_file().jobs[0]);
    assert_eq!(merged.fg_slope, 48500);
    assert_eq!(merged.codec_timeout, Some(Duration::from_secs(30)));
}

#[test]
fn test_merge_skip_pages_become_zero_based() {
    let job_yaml = r#"
jobs:
  - images: "pages"
    layout: "layout.json"
    output: "out"
    skip_pages: "1,3"
"#;
    let job_file: JobFile = serde_yml::from_str(job_yaml).expect("parse job");
    let merged = MergedConfig::new(&Settings::default(), &job_file.jobs[0]);
    assert_eq!(merged.skip_pages, vec![0, 2]);
}

#[test]
fn test_validate_rejects_zero_factors() {
    let job = &minimal_job_file().jobs[0];
    let mut merged = MergedConfig::new(&Settings::default(), job);
    assert!(merged.validate().is_ok());

    merged.downsample = Some(0);
    assert!(merged.validate().is_err());

    let mut merged = MergedConfig::new(&Settings::default(), job);
    merged.fg_psnr = 0;
    assert!(merged.validate().is_err());

    let mut merged = MergedConfig::new(&Settings::default(), job);
    merged.report_every = Some(0);
    assert!(merged.validate().is_err());
}

// ============================================================
// 5. settings.yaml自動検出とパス解決
// ============================================================

#[test]
fn test_auto_detect_settings_yaml_exists() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let settings_path = dir.path().join("settings.yaml");
    let job_path = dir.path().join("jobs.yaml");

    let mut f = std::fs::File::create(&settings_path).expect("create settings.yaml");
    f.write_all(b"fg_psnr: 32\n").expect("write settings");
    std::fs::File::create(&job_path).expect("create jobs.yaml");

    let settings = load_settings_for_job(&job_path).expect("should load settings");
    assert_eq!(settings.fg_psnr, 32);
}

#[test]
fn test_auto_detect_settings_yaml_missing() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let job_path = dir.path().join("jobs.yaml");
    std::fs::File::create(&job_path).expect("create jobs.yaml");

    let settings = load_settings_for_job(&job_path).expect("should return defaults");
    assert_eq!(settings.fg_psnr, 25, "should use default when settings.yaml absent");
}

#[test]
fn test_load_job_file_and_resolve_paths() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let job_path = dir.path().join("jobs.yaml");
    std::fs::write(&job_path, MINIMAL_JOB).expect("write jobs.yaml");

    let job_file = load_job_file(&job_path).expect("should load");
    let images = resolve_path(&job_path, &job_file.jobs[0].images);
    assert_eq!(images, dir.path().join("pages"));
    assert_eq!(resolve_path(&job_path, "/abs/out"), Path::new("/abs/out"));
}

#[test]
fn test_load_job_file_missing() {
    let dir = tempfile::tempdir().expect("create temp dir");
    assert!(load_job_file(&dir.path().join("absent.yaml")).is_err());
}
