#![allow(missing_docs)]

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use common::collectors::PlatformCollector;
use common::config::{load_yaml_file, ReportFormat, WardenConfig};
use common::fingerprint::fingerprint_ex;
use common::hwid::snap_motherboard_ex;
use common::io::{encode_binary_ex, write_fingerprint_ex, write_text_ex};
use common::telemetry::init_telemetry;
use common::vm::{analyze_ex, NetworkEvidence};

#[cfg(any(target_os = "linux", windows))]
fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

#[cfg(not(any(target_os = "linux", windows)))]
fn main() {
    eprintln!("warden-probe 不支持当前平台");
    std::process::exit(1);
}

#[cfg(any(target_os = "linux", windows))]
fn run() -> Result<(), String> {
    init_telemetry().map_err(|e| format!("初始化日志失败: {e}"))?;

    let args = parse_args(std::env::args().skip(1))?;

    let mut cfg = match args.config_path {
        Some(path) => load_yaml_file(path.as_path())
            .map_err(|e| format!("加载配置失败（{}）: {e}", path.display()))?,
        None => WardenConfig::default(),
    };
    if let Some(format) = args.format {
        cfg.report.format = format;
    }
    if let Some(output_path) = args.output_path {
        cfg.report.output_path = Some(output_path);
    }
    if args.verdict {
        cfg.report.include_verdict = true;
    }
    cfg.validate().map_err(|e| format!("配置校验失败: {e}"))?;

    let collector = common::collectors::default_collector();
    let mut board = snap_motherboard_ex(&collector);
    if !cfg.evidence.include_drives {
        board.drives.clear();
    }

    tracing::info!(drives = board.drives.len(), "硬件快照已采集");

    match cfg.report.format {
        ReportFormat::Text => {
            let mut stdout = std::io::stdout().lock();
            write_text_ex(&mut stdout, &board).map_err(|e| format!("写出文本报告失败: {e}"))?;
            writeln!(stdout, "Fingerprint: {}", fingerprint_ex(&board))
                .map_err(|e| format!("写出指纹失败: {e}"))?;
        }
        ReportFormat::Binary => {
            let Some(path) = cfg.report.output_path.as_ref() else {
                return Err("binary 格式缺少 report.output_path".to_string());
            };
            std::fs::write(path, encode_binary_ex(&board))
                .map_err(|e| format!("写出二进制记录失败（{}）: {e}", path.display()))?;
        }
        ReportFormat::Hash => {
            let Some(path) = cfg.report.output_path.as_ref() else {
                return Err("hash 格式缺少 report.output_path".to_string());
            };
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(|e| format!("打开输出文件失败（{}）: {e}", path.display()))?;
            file.set_len(32)
                .map_err(|e| format!("预留指纹空间失败: {e}"))?;
            let written = write_fingerprint_ex(&mut file, &board)
                .map_err(|e| format!("写出指纹失败: {e}"))?;
            if written == 0 {
                return Err("输出文件空间不足，指纹未写入".to_string());
            }
        }
    }

    if cfg.report.include_verdict {
        let network = if cfg.evidence.include_network {
            collector.list_network_adapters()
        } else {
            NetworkEvidence::default()
        };
        let verdict = analyze_ex(&board, &network);

        println!("Verdict: {}", verdict.confidence.as_str());
        for flag in &verdict.detections {
            println!(" - {}", flag.as_str());
        }
    }

    Ok(())
}

#[derive(Debug, Default)]
struct ProbeArgs {
    config_path: Option<PathBuf>,
    format: Option<ReportFormat>,
    output_path: Option<PathBuf>,
    verdict: bool,
}

fn parse_args<I>(mut it: I) -> Result<ProbeArgs, String>
where
    I: Iterator<Item = String>,
{
    let mut args = ProbeArgs::default();

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => {
                let val = it.next().ok_or("--config 缺少参数".to_string())?;
                args.config_path = Some(PathBuf::from(val));
            }
            "--format" => {
                let val = it.next().ok_or("--format 缺少参数".to_string())?;
                args.format = Some(match val.as_str() {
                    "text" => ReportFormat::Text,
                    "binary" => ReportFormat::Binary,
                    "hash" => ReportFormat::Hash,
                    other => return Err(format!("未知格式: {other}")),
                });
            }
            "--output" => {
                let val = it.next().ok_or("--output 缺少参数".to_string())?;
                args.output_path = Some(PathBuf::from(val));
            }
            "--verdict" => {
                args.verdict = true;
            }
            "--help" | "-h" => {
                return Err(
                    "Usage: warden-probe [--config <FILE>] [--format text|binary|hash] \
                     [--output <FILE>] [--verdict]\n"
                        .to_string(),
                );
            }
            other => return Err(format!("未知参数: {other}")),
        }
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<ProbeArgs, String> {
        parse_args(list.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn no_arguments_is_valid() {
        let parsed = args(&[]).unwrap();
        assert!(parsed.config_path.is_none());
        assert!(parsed.format.is_none());
        assert!(!parsed.verdict);
    }

    #[test]
    fn format_and_output_are_parsed() {
        let parsed = args(&["--format", "hash", "--output", "fp.bin", "--verdict"]).unwrap();
        assert_eq!(parsed.format, Some(ReportFormat::Hash));
        assert_eq!(parsed.output_path, Some(PathBuf::from("fp.bin")));
        assert!(parsed.verdict);
    }

    #[test]
    fn unknown_argument_is_rejected() {
        assert!(args(&["--nope"]).is_err());
        assert!(args(&["--format", "yaml"]).is_err());
        assert!(args(&["--config"]).is_err());
    }
}
