#![allow(dead_code)]

use assert_cmd::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const ZN_TS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE TS>
<TS version="2.1" language="zh_CN">
<context>
    <name>MainWindow</name>
    <message>
        <location filename="../mainwindow.cpp" line="12"/>
        <source>hello</source>
        <translation>你好</translation>
    </message>
    <message>
        <source>bye</source>
        <translation>再见</translation>
    </message>
</context>
</TS>
"#;

pub const EN_TS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE TS>
<TS version="2.1" language="en">
<context>
    <name>MainWindow</name>
    <message>
        <location filename="../mainwindow.cpp" line="12"/>
        <source>hello</source>
        <translation type="unfinished"></translation>
    </message>
    <message>
        <source>bye</source>
        <translation type="unfinished"></translation>
    </message>
</context>
</TS>
"#;

/// Binary isolated from the user's config and log directories.
pub fn bin_cmd(sandbox: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tsloc").expect("binary built");
    cmd.current_dir(sandbox)
        .env("TSLOC_LOG_DIR", sandbox.join("logs"))
        .env("XDG_CONFIG_HOME", sandbox.join("config"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("TSLOC_LRELEASE");
    cmd
}

pub fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// `zn.ts` + `en.ts` under `<root>/i18n`.
pub fn sample_docs(root: &Path) -> PathBuf {
    write(root, "i18n/zn.ts", ZN_TS);
    write(root, "i18n/en.ts", EN_TS);
    root.join("i18n")
}
