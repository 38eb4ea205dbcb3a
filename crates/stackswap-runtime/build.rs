//! Build script for stackswap-runtime
//!
//! Handles configuration merging:
//! 1. Start with library defaults
//! 2. If SSW_CONFIG_RS env var is set, parse user's config file
//! 3. Merge user values over defaults (user wins)
//! 4. Generate OUT_DIR/ssw_merged_config.rs
//!
//! User only needs to specify values they want to change.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

/// Configuration parameter definition
struct ConfigParam {
    name: &'static str,
    rust_type: &'static str,
    default_value: &'static str,
    doc: &'static str,
}

/// All configuration parameters with their defaults
const CONFIG_PARAMS: &[ConfigParam] = &[
    ConfigParam {
        name: "IDLE_RESERVE",
        rust_type: "usize",
        default_value: "64 * 1024",
        doc: "Native stack bytes reserved below the engine constructor",
    },
    ConfigParam {
        name: "DISPATCH_STACK_SIZE",
        rust_type: "usize",
        default_value: "128 * 1024",
        doc: "Usable bytes of the private dispatch stack",
    },
    ConfigParam {
        name: "TRACE_SWITCHES",
        rust_type: "bool",
        default_value: "false",
        doc: "Log every context switch at debug level",
    },
];

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let dest_path = Path::new(&out_dir).join("ssw_merged_config.rs");

    let mut config: HashMap<&str, String> = CONFIG_PARAMS
        .iter()
        .map(|p| (p.name, p.default_value.to_string()))
        .collect();

    let user_path = env::var("SSW_CONFIG_RS").ok();
    if let Some(path) = &user_path {
        println!("cargo:rerun-if-changed={}", path);

        match fs::read_to_string(path) {
            Ok(content) => {
                parse_and_merge(&content, &mut config);
                println!("cargo:warning=Using custom config: {}", path);
            }
            Err(e) => {
                println!("cargo:warning=Failed to read SSW_CONFIG_RS ({}): {}", path, e);
            }
        }
    }

    println!("cargo:rerun-if-env-changed=SSW_CONFIG_RS");
    println!("cargo:rerun-if-changed=build.rs");

    let output = generate_config(&config, user_path.is_some());
    fs::write(&dest_path, output).expect("Failed to write merged config");
}

/// Parse user's config file and merge values into config map
fn parse_and_merge(content: &str, config: &mut HashMap<&str, String>) {
    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with("//") || !line.starts_with("pub const ") {
            continue;
        }

        let Some((name, value)) = parse_const_line(line) else {
            continue;
        };

        match CONFIG_PARAMS.iter().find(|p| p.name == name) {
            Some(param) => {
                config.insert(param.name, value);
            }
            None => println!("cargo:warning=Unknown config parameter: {}", name),
        }
    }
}

/// Parse `pub const NAME: TYPE = VALUE;` into (name, value)
fn parse_const_line(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("pub const ")?.trim();

    let colon_pos = rest.find(':')?;
    let name = rest[..colon_pos].trim().to_string();

    let eq_pos = rest.find('=')?;
    let semi_pos = rest.rfind(';').unwrap_or(rest.len());
    if semi_pos <= eq_pos {
        return None;
    }

    let value = rest[eq_pos + 1..semi_pos].trim().to_string();
    Some((name, value))
}

/// Generate the merged config Rust file
fn generate_config(config: &HashMap<&str, String>, has_user_file: bool) -> String {
    let mut output = String::new();

    output.push_str("// Auto-generated by build.rs - do not edit\n");
    output.push_str("// Configuration merged from library defaults");
    if has_user_file {
        output.push_str(" and SSW_CONFIG_RS");
    }
    output.push_str("\n\n");

    for param in CONFIG_PARAMS {
        let value = config
            .get(param.name)
            .map(String::as_str)
            .unwrap_or(param.default_value);
        output.push_str(&format!(
            "/// {}\npub const {}: {} = {};\n",
            param.doc, param.name, param.rust_type, value
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_const_line() {
        let result = parse_const_line("pub const IDLE_RESERVE: usize = 32768;");
        assert_eq!(result, Some(("IDLE_RESERVE".into(), "32768".into())));

        let result = parse_const_line("pub const TRACE_SWITCHES: bool = true;");
        assert_eq!(result, Some(("TRACE_SWITCHES".into(), "true".into())));

        let result = parse_const_line("pub const DISPATCH_STACK_SIZE: usize = 256 * 1024;");
        assert_eq!(
            result,
            Some(("DISPATCH_STACK_SIZE".into(), "256 * 1024".into()))
        );

        assert_eq!(parse_const_line("pub const BROKEN;"), None);
    }

    #[test]
    fn test_parse_and_merge() {
        let mut config: HashMap<&str, String> = HashMap::new();
        config.insert("IDLE_RESERVE", "64 * 1024".into());
        config.insert("TRACE_SWITCHES", "false".into());

        let user_config = r#"
            // Custom config
            pub const IDLE_RESERVE: usize = 128 * 1024;
            pub const TRACE_SWITCHES: bool = true;
            pub const NOT_A_PARAM: usize = 1;
        "#;

        parse_and_merge(user_config, &mut config);

        assert_eq!(config.get("IDLE_RESERVE"), Some(&"128 * 1024".to_string()));
        assert_eq!(config.get("TRACE_SWITCHES"), Some(&"true".to_string()));
        assert!(!config.contains_key("NOT_A_PARAM"));
    }

    #[test]
    fn test_generate_config() {
        let config: HashMap<&str, String> = CONFIG_PARAMS
            .iter()
            .map(|p| (p.name, p.default_value.to_string()))
            .collect();
        let out = generate_config(&config, false);
        assert!(out.contains("pub const IDLE_RESERVE: usize = 64 * 1024;"));
        assert!(out.contains("pub const TRACE_SWITCHES: bool = false;"));
    }
}
