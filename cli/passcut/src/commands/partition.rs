//! `passcut partition`: split a block into passes for a target.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use passcut_ir::Block;
use passcut_partition::{partition_block, PartitionConfig, PartitionOutput, Strategy};

use super::load_registry;

/// Options of one `passcut partition` invocation.
pub struct PartitionArgs<'a> {
    pub input: &'a Path,
    pub target: &'a str,
    pub targets_dir: Option<&'a Path>,
    pub config: Option<&'a Path>,
    pub strategy: Option<&'a str>,
    pub format: Option<&'a str>,
    pub verify: bool,
    pub output: Option<&'a Path>,
    pub cwd: &'a Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Json,
}

fn parse_format(format: Option<&str>) -> Result<Format> {
    match format {
        None | Some("text") => Ok(Format::Text),
        Some("json") => Ok(Format::Json),
        Some(other) => bail!("unknown format: '{other}'. Expected 'text' or 'json'."),
    }
}

fn parse_strategy(strategy: &str) -> Result<Strategy> {
    match strategy {
        "greedy" | "rds" => Ok(Strategy::Greedy),
        "heuristic" | "rdsh" => Ok(Strategy::Heuristic),
        "exhaustive" | "full" => Ok(Strategy::Exhaustive),
        other => bail!(
            "unknown strategy: '{other}'. Expected 'greedy', 'heuristic' or 'exhaustive'."
        ),
    }
}

/// Build the run configuration: file first, then command-line overrides.
fn resolve_config(args: &PartitionArgs<'_>) -> Result<PartitionConfig> {
    let mut config = match args.config {
        Some(path) => PartitionConfig::load(path)?,
        None => PartitionConfig::default(),
    };
    if let Some(s) = args.strategy {
        config.strategy = parse_strategy(s)?;
    }
    if args.verify {
        config.verify = true;
    }
    Ok(config)
}

fn load_block(path: &Path) -> Result<Block> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let block =
        Block::from_json(&json).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(block)
}

/// Partition the input block and print or write the result.
pub fn run(args: &PartitionArgs<'_>) -> Result<()> {
    let format = parse_format(args.format)?;
    let config = resolve_config(args)?;
    let registry = load_registry(args.cwd, args.targets_dir)?;
    let block = load_block(args.input)?;

    tracing::debug!(
        input = %args.input.display(),
        statements = block.len(),
        strategy = %config.strategy,
        "partitioning"
    );

    let out = partition_block(&block, args.target, &registry, &config)
        .with_context(|| format!("cannot partition {}", args.input.display()))?;

    let rendered = match format {
        Format::Text => render_text(&out),
        Format::Json => render_json(&out)?,
    };

    match args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!(
                "Wrote {} passes to {}",
                out.partition.pass_count(),
                path.display()
            );
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

/// The report followed by every pass body.
fn render_text(out: &PartitionOutput) -> String {
    let mut s = out.report.to_string();

    if !out.partition.shared.is_empty() {
        s.push('\n');
        s.push_str("--- Shared Variables ---\n");
        for sv in &out.partition.shared {
            let _ = writeln!(
                s,
                "  ch{} {} <- {} ({}, size {})",
                sv.channel, sv.name, sv.var, sv.producer, sv.size
            );
        }
    }

    for pass in &out.partition.passes {
        s.push('\n');
        let _ = writeln!(s, "--- Pass {} [{}] ---", pass.id, pass.label);
        if !pass.channels_in.is_empty() {
            let chans: Vec<String> = pass.channels_in.iter().map(|c| format!("ch{c}")).collect();
            let _ = writeln!(s, "  reads: {}", chans.join(", "));
        }
        if let Some(c) = pass.channel_out {
            let _ = writeln!(s, "  writes: ch{c}");
        }
        if !pass.outputs.is_empty() {
            let _ = writeln!(s, "  outputs: {}", pass.outputs.join(", "));
        }
        for line in pass.body.to_string().lines() {
            let _ = writeln!(s, "  {line}");
        }
    }
    s
}

fn render_json(out: &PartitionOutput) -> Result<String> {
    let value = serde_json::json!({
        "report": out.report,
        "partition": out.partition,
    });
    let mut json = serde_json::to_string_pretty(&value)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use passcut_ir::{Opcode, VarKind};

    fn mad_chain(n: usize) -> Block {
        let mut b = Block::new();
        let a = b.var("a", VarKind::Input, 4);
        let mut prev = a;
        for i in 0..n {
            let dest = if i + 1 == n {
                b.var("out", VarKind::Output, 4)
            } else {
                b.var(&format!("t{i}"), VarKind::Temp, 4)
            };
            b.emit(dest, Opcode::Mad, &[prev, a, a]);
            prev = dest;
        }
        b
    }

    const TWO_INSTR: &str = r#"
name = "two"
version = "1.0.0"
stage = "fragment"

[limits]
instructions = 2
"#;

    fn setup(dir: &Path) -> std::path::PathBuf {
        let targets = dir.join("targets");
        std::fs::create_dir_all(&targets).unwrap();
        std::fs::write(targets.join("two.target.toml"), TWO_INSTR).unwrap();
        let input = dir.join("chain.json");
        std::fs::write(&input, mad_chain(5).to_json().unwrap()).unwrap();
        input
    }

    fn args<'a>(input: &'a Path, cwd: &'a Path, output: Option<&'a Path>) -> PartitionArgs<'a> {
        PartitionArgs {
            input,
            target: "two",
            targets_dir: None,
            config: None,
            strategy: None,
            format: None,
            verify: true,
            output,
            cwd,
        }
    }

    #[test]
    fn parse_options() {
        assert_eq!(parse_format(None).unwrap(), Format::Text);
        assert_eq!(parse_format(Some("json")).unwrap(), Format::Json);
        assert!(parse_format(Some("yaml")).is_err());
        assert_eq!(parse_strategy("greedy").unwrap(), Strategy::Greedy);
        assert_eq!(parse_strategy("exhaustive").unwrap(), Strategy::Exhaustive);
        assert_eq!(parse_strategy("heuristic").unwrap(), Strategy::Heuristic);
        assert!(parse_strategy("random").is_err());
    }

    #[test]
    fn partition_to_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = setup(dir.path());
        let output = dir.path().join("out.txt");
        run(&args(&input, dir.path(), Some(&output))).unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.contains("=== Partition Report ==="));
        assert!(text.contains("Target: two"));
        assert!(text.contains("--- Passes (3) ---"));
        assert!(text.contains("--- Shared Variables ---"));
        assert!(text.contains("--- Verification: PASSED ---"));
        assert!(text.contains("outputs: out"));
    }

    #[test]
    fn partition_to_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = setup(dir.path());
        let output = dir.path().join("out.json");
        let mut a = args(&input, dir.path(), Some(&output));
        a.format = Some("json");
        a.strategy = Some("exhaustive");
        run(&a).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(json["partition"]["passes"].as_array().unwrap().len(), 3);
        assert_eq!(json["report"]["strategy"], "exhaustive");
    }

    #[test]
    fn config_file_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let input = setup(dir.path());
        let config = dir.path().join("passcut.toml");
        std::fs::write(&config, "strategy = \"exhaustive\"\nverify = true\n").unwrap();
        let mut a = args(&input, dir.path(), None);
        a.config = Some(&config);
        a.verify = false;
        let resolved = resolve_config(&a).unwrap();
        assert_eq!(resolved.strategy, Strategy::Exhaustive);
        assert!(resolved.verify);
    }

    #[test]
    fn unknown_target_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = setup(dir.path());
        let mut a = args(&input, dir.path(), None);
        a.target = "voodoo2";
        let err = run(&a).unwrap_err();
        assert!(format!("{err:#}").contains("voodoo2"));
    }

    #[test]
    fn missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(run(&args(&missing, dir.path(), None)).is_err());
    }
}
