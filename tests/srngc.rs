//  Copyright (C) 2014-2022 Ryan Specialty Group, LLC.
//
//  This file is part of srngc.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

#[test]
fn compile_invalid_argument() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("srngc")?;
    cmd.arg("-q");
    cmd.assert()
        .failure()
        .code(exitcode::USAGE)
        .stderr(predicate::str::contains("Unrecognized option:"));

    Ok(())
}

#[test]
fn compile_missing_schema_flag() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("srngc")?;
    cmd.arg("--out=out.json");
    cmd.assert()
        .failure()
        .code(exitcode::USAGE)
        .stderr(predicate::str::contains("--srng"));

    Ok(())
}

#[test]
fn compile_missing_out_flag() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("srngc")?;
    cmd.arg("--srng=schema.srng");
    cmd.assert()
        .failure()
        .code(exitcode::USAGE)
        .stderr(predicate::str::contains("--out"));

    Ok(())
}

#[test]
fn compile_stray_argument() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("srngc")?;
    cmd.arg("--srng=schema.srng")
        .arg("--out=out.json")
        .arg("extra");
    cmd.assert()
        .failure()
        .code(exitcode::USAGE)
        .stderr(predicate::str::contains("Unrecognized option:"));

    Ok(())
}

#[test]
fn compile_input_file_does_not_exist() -> Result<(), Box<dyn std::error::Error>>
{
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out.json");

    let mut cmd = Command::cargo_bin("srngc")?;
    cmd.arg("--srng=does-not-exist.srng");
    cmd.arg(format!("--out={}", out.display()));
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("No such file or directory"));

    assert!(!out.exists(), "output must not be written on failure");

    Ok(())
}

#[test]
fn compile_schema_in_wrong_namespace() -> Result<(), Box<dyn std::error::Error>>
{
    let dir = tempfile::tempdir()?;
    let schema = dir.path().join("schema.srng");
    let out = dir.path().join("out.json");

    fs::write(&schema, r#"<grammar xmlns="urn:wrong"/>"#)?;

    let mut cmd = Command::cargo_bin("srngc")?;
    cmd.arg(format!("--srng={}", schema.display()));
    cmd.arg(format!("--out={}", out.display()));
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("RELAX NG namespace"));

    assert!(!out.exists(), "output must not be written on failure");

    Ok(())
}

#[test]
fn compile_single_empty_element() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let schema = dir.path().join("schema.srng");
    let out = dir.path().join("out.json");

    fs::write(
        &schema,
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
             <define name="A">
               <element>
                 <name ns="">r</name>
                 <empty/>
               </element>
             </define>
           </grammar>"#,
    )?;

    let mut cmd = Command::cargo_bin("srngc")?;
    cmd.arg(format!("--srng={}", schema.display()));
    cmd.arg(format!("--out={}", out.display()));
    cmd.assert().success();

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out)?)?;

    assert_eq!(
        serde_json::json!({
            "NameMap": {"": {"r": 1}},
            "States": [
                null,
                {"Attributes": {}, "IsNullable": true, "ChildElems": {}},
            ],
        }),
        written,
    );

    Ok(())
}

// Key order is canonical, so repeated compiles must be byte-identical.
#[test]
fn compile_is_deterministic() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let schema = dir.path().join("schema.srng");

    fs::write(
        &schema,
        r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
             <define name="Tree">
               <element>
                 <name ns="">tree</name>
                 <attribute><name ns="">label</name><text/></attribute>
                 <zeroOrMore><ref name="Tree"/></zeroOrMore>
               </element>
             </define>
           </grammar>"#,
    )?;

    let mut outputs = Vec::new();

    for name in ["a.json", "b.json"] {
        let out = dir.path().join(name);

        let mut cmd = Command::cargo_bin("srngc")?;
        cmd.arg(format!("--srng={}", schema.display()));
        cmd.arg(format!("--out={}", out.display()));
        cmd.assert().success();

        outputs.push(fs::read(&out)?);
    }

    assert_eq!(outputs[0], outputs[1]);

    Ok(())
}
