use std::fs;
use std::path::PathBuf;

use color_eyre::eyre::Result;

pub fn run_schema(out_dir: PathBuf, configured: Option<String>) -> Result<()> {
    let out_dir = if out_dir.as_os_str().is_empty() {
        PathBuf::from(configured.unwrap_or_else(|| "./docs/assets/schemas".to_string()))
    } else {
        out_dir
    };
    fs::create_dir_all(&out_dir)?;
    macro_rules! dump {
        ($ty:ty, $name:literal) => {{
            let schema = schemars::schema_for!($ty);
            let path = out_dir.join($name);
            let f = fs::File::create(&path)?;
            serde_json::to_writer_pretty(f, &schema)?;
        }};
    }
    dump!(tsloc_domain::TaskReport, "task_report.schema.json");
    dump!(tsloc_domain::Tally, "tally.schema.json");
    ui_ok!("schemas written to {}", out_dir.display());
    Ok(())
}
