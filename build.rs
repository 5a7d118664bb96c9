use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const ENV_PREFIXES: [&str; 2] = ["OPENROUTER_", "CHAT_MARKETS_"];
// Tokens that share a prefix but are not configuration keys.
const NOT_ENV_KEYS: [&str; 1] = ["CHAT_MARKETS_EVENT"];

fn collect_rs_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_rs_files(&path, out)?;
        } else if path.extension().and_then(|ext| ext.to_str()) == Some("rs") {
            out.push(path);
        }
    }
    Ok(())
}

fn is_env_key_char(byte: u8) -> bool {
    byte.is_ascii_uppercase() || byte.is_ascii_digit() || byte == b'_'
}

fn collect_env_keys(source: &str, prefix: &str, out: &mut BTreeSet<String>) {
    let bytes = source.as_bytes();
    let needle = prefix.as_bytes();
    let mut i = 0usize;
    while i + needle.len() <= bytes.len() {
        let starts_word = i == 0 || !is_env_key_char(bytes[i - 1]);
        if starts_word && &bytes[i..i + needle.len()] == needle {
            let mut j = i + needle.len();
            while j < bytes.len() && is_env_key_char(bytes[j]) {
                j += 1;
            }
            // Skip bare prefixes and prefixes used as format fragments.
            if j > i + needle.len()
                && bytes[j - 1] != b'_'
                && let Some(raw) = source.get(i..j)
            {
                out.insert(raw.to_string());
            }
            i = j;
            continue;
        }
        i += 1;
    }
}

fn write_generated_allowlist() -> std::io::Result<()> {
    let mut rs_files = Vec::new();
    collect_rs_files(Path::new("src"), &mut rs_files)?;

    let mut keys = BTreeSet::new();
    for file in rs_files {
        if let Ok(content) = fs::read_to_string(&file) {
            for prefix in ENV_PREFIXES {
                collect_env_keys(&content, prefix, &mut keys);
            }
        }
    }

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    let generated = Path::new(&out_dir).join("env_allowlist.rs");
    for token in NOT_ENV_KEYS {
        keys.remove(token);
    }
    let mut f = fs::File::create(generated)?;
    writeln!(f, "pub const GENERATED_ENV_ALLOWLIST: &[&str] = &[")?;
    for key in keys {
        writeln!(f, "    \"{key}\",")?;
    }
    writeln!(f, "];")?;
    Ok(())
}

fn main() {
    write_generated_allowlist().expect("failed to generate env allowlist");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");
}
