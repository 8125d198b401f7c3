use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::parse::FormatGeneration;

const MEMBER_DIRS: [&str; 4] = ["", "config/", "mcp/", "srg/"];

#[derive(Debug, Clone)]
pub struct RawBundle {
    pub generation: FormatGeneration,
    pub export: String,
    pub fields_csv: String,
    pub methods_csv: String,
    pub params_csv: String,
    pub static_methods: String,
    pub constructor_table: Option<String>,
}

impl RawBundle {
    pub fn export_member(generation: FormatGeneration) -> &'static str {
        match generation {
            FormatGeneration::Srg => "joined.srg",
            FormatGeneration::Tsrg => "joined.tsrg",
        }
    }

    pub fn constructor_member(generation: FormatGeneration) -> &'static str {
        match generation {
            FormatGeneration::Srg => "joined.exc",
            FormatGeneration::Tsrg => "constructors.txt",
        }
    }

    pub fn load(path: &Path, generation: FormatGeneration) -> Result<Self> {
        if path.is_dir() {
            Self::from_dir(path, generation)
        } else {
            Self::from_zip(path, generation)
        }
    }

    pub fn from_dir(dir: &Path, generation: FormatGeneration) -> Result<Self> {
        let mut read = |member: &str| -> Result<Option<String>> {
            for sub in MEMBER_DIRS {
                let candidate = dir.join(sub).join(member);
                if candidate.is_file() {
                    let text = std::fs::read_to_string(&candidate).with_context(|| {
                        format!("failed to read bundle member: {}", candidate.display())
                    })?;
                    return Ok(Some(text));
                }
            }
            Ok(None)
        };
        Self::assemble(generation, &mut read)
    }

    pub fn from_zip(path: &Path, generation: FormatGeneration) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open bundle archive: {}", path.display()))?;
        let mut archive = zip::ZipArchive::new(file)
            .with_context(|| format!("failed to read bundle archive: {}", path.display()))?;
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();

        let mut read = |member: &str| -> Result<Option<String>> {
            let found = names
                .iter()
                .find(|n| *n == member || n.ends_with(&format!("/{member}")));
            let Some(name) = found else {
                return Ok(None);
            };
            let mut entry = archive.by_name(name)?;
            let mut text = String::new();
            entry
                .read_to_string(&mut text)
                .with_context(|| format!("failed to read bundle member: {name}"))?;
            Ok(Some(text))
        };
        Self::assemble(generation, &mut read)
    }

    fn assemble(
        generation: FormatGeneration,
        read: &mut dyn FnMut(&str) -> Result<Option<String>>,
    ) -> Result<Self> {
        let export_member = Self::export_member(generation);
        let export = read(export_member)?
            .with_context(|| format!("bundle is missing required member {export_member:?}"))?;
        let fields_csv = read("fields.csv")?
            .context("bundle is missing required member \"fields.csv\"")?;
        let methods_csv = read("methods.csv")?
            .context("bundle is missing required member \"methods.csv\"")?;
        let params_csv = read("params.csv")?
            .context("bundle is missing required member \"params.csv\"")?;
        // Older exports predate both auxiliary tables.
        let static_methods = read("static_methods.txt")?.unwrap_or_default();
        let constructor_table = read(Self::constructor_member(generation))?;
        Ok(Self {
            generation,
            export,
            fields_csv,
            methods_csv,
            params_csv,
            static_methods,
            constructor_table,
        })
    }

    /// Opaque content stamp over every member, usable as a snapshot id when
    /// the caller does not supply one.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for member in [
            &self.export,
            &self.fields_csv,
            &self.methods_csv,
            &self.params_csv,
            &self.static_methods,
        ] {
            hasher.update(member.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(self.constructor_table.as_deref().unwrap_or("").as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "mapping_finder_bundle_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ))
    }

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        use zip::write::FileOptions;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let file = File::create(path).unwrap();
        let mut archive = zip::ZipWriter::new(file);
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in entries {
            archive.start_file(*name, options).unwrap();
            archive.write_all(content.as_bytes()).unwrap();
        }
        archive.finish().unwrap();
    }

    #[test]
    fn loads_members_from_directory_layouts() {
        let dir = temp_dir("dir_layout");
        write_file(&dir.join("config/joined.tsrg"), "a b\n");
        write_file(&dir.join("mcp/fields.csv"), "searge,name,side,desc\n");
        write_file(&dir.join("mcp/methods.csv"), "searge,name,side,desc\n");
        write_file(&dir.join("mcp/params.csv"), "param,name,side\n");
        write_file(&dir.join("config/static_methods.txt"), "func_1\n");

        let bundle = RawBundle::from_dir(&dir, FormatGeneration::Tsrg).unwrap();
        assert_eq!(bundle.export, "a b\n");
        assert_eq!(bundle.static_methods, "func_1\n");
        assert_eq!(bundle.constructor_table, None);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn loads_members_from_zip_archive() {
        let dir = temp_dir("zip_layout");
        let path = dir.join("bundle.zip");
        write_zip(
            &path,
            &[
                ("config/joined.tsrg", "a b\n"),
                ("fields.csv", "searge,name,side,desc\n"),
                ("methods.csv", "searge,name,side,desc\n"),
                ("params.csv", "param,name,side\n"),
                ("config/constructors.txt", "1 net/minecraft/Foo ()V\n"),
            ],
        );

        let bundle = RawBundle::from_zip(&path, FormatGeneration::Tsrg).unwrap();
        assert_eq!(bundle.export, "a b\n");
        assert_eq!(
            bundle.constructor_table.as_deref(),
            Some("1 net/minecraft/Foo ()V\n")
        );
        assert_eq!(bundle.static_methods, "");

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_required_member_is_an_error() {
        let dir = temp_dir("missing_member");
        write_file(&dir.join("joined.tsrg"), "a b\n");
        let err = RawBundle::from_dir(&dir, FormatGeneration::Tsrg).unwrap_err();
        assert!(err.to_string().contains("fields.csv"), "{err}");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn digest_tracks_member_content() {
        let base = RawBundle {
            generation: FormatGeneration::Tsrg,
            export: "a b\n".to_string(),
            fields_csv: "searge,name,side,desc\n".to_string(),
            methods_csv: "searge,name,side,desc\n".to_string(),
            params_csv: "param,name,side\n".to_string(),
            static_methods: String::new(),
            constructor_table: None,
        };
        let mut changed = base.clone();
        changed.fields_csv.push_str("field_1,a,2,\n");
        assert_eq!(base.digest(), base.digest());
        assert_ne!(base.digest(), changed.digest());
    }
}
