// ─── Descriptor ───
// Parses the key/value manifest block stored at `META-INF/MANIFEST.MF`.

use std::collections::HashMap;

use crate::core::error::{LoaderError, LoaderResult};

pub const DESCRIPTOR_PATH: &str = "META-INF/MANIFEST.MF";

pub const MAIN_CLASS: &str = "Main-Class";
pub const MULTI_RELEASE: &str = "Multi-Release";
pub const SEALED: &str = "Sealed";
pub const SPECIFICATION_TITLE: &str = "Specification-Title";
pub const SPECIFICATION_VERSION: &str = "Specification-Version";
pub const SPECIFICATION_VENDOR: &str = "Specification-Vendor";
pub const IMPLEMENTATION_TITLE: &str = "Implementation-Title";
pub const IMPLEMENTATION_VERSION: &str = "Implementation-Version";
pub const IMPLEMENTATION_VENDOR: &str = "Implementation-Vendor";

/// One attribute block. Names compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    values: HashMap<String, String>,
}

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_ascii_lowercase(), value.into());
    }
}

/// A parsed descriptor: the main block plus per-path sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    main: Attributes,
    sections: HashMap<String, Attributes>,
}

impl Descriptor {
    /// Parse descriptor bytes.
    ///
    /// Lines are `Name: value`; a line starting with a single space continues
    /// the previous value. Blank lines separate sections, and every section
    /// after the first must start with `Name: <path>`.
    pub fn parse(bytes: &[u8]) -> LoaderResult<Self> {
        let text = String::from_utf8_lossy(bytes);
        let mut descriptor = Descriptor::default();

        let mut block: Vec<(String, String)> = Vec::new();
        let mut first_block = true;

        for raw_line in text.split('\n') {
            let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

            if line.is_empty() {
                if !block.is_empty() {
                    descriptor.commit(std::mem::take(&mut block), first_block)?;
                    first_block = false;
                }
                continue;
            }

            if let Some(continuation) = line.strip_prefix(' ') {
                match block.last_mut() {
                    Some((_, value)) => value.push_str(continuation),
                    None => {
                        return Err(LoaderError::MalformedInput(format!(
                            "descriptor continuation without a header: {line:?}"
                        )))
                    }
                }
                continue;
            }

            let (name, value) = line.split_once(':').ok_or_else(|| {
                LoaderError::MalformedInput(format!("descriptor line without ':': {line:?}"))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(LoaderError::MalformedInput(format!(
                    "descriptor attribute without a name: {line:?}"
                )));
            }
            block.push((name.to_string(), value.trim_start().to_string()));
        }

        if !block.is_empty() {
            descriptor.commit(block, first_block)?;
        }

        Ok(descriptor)
    }

    fn commit(&mut self, block: Vec<(String, String)>, is_main: bool) -> LoaderResult<()> {
        if is_main {
            for (name, value) in block {
                self.main.insert(&name, value);
            }
            return Ok(());
        }

        let mut attributes = Attributes::default();
        let mut section_name = None;
        for (name, value) in block {
            if section_name.is_none() && name.eq_ignore_ascii_case("Name") {
                section_name = Some(value);
            } else {
                attributes.insert(&name, value);
            }
        }

        let section_name = section_name.ok_or_else(|| {
            LoaderError::MalformedInput("descriptor section without a Name attribute".into())
        })?;
        self.sections.insert(section_name, attributes);
        Ok(())
    }

    pub fn main_attributes(&self) -> &Attributes {
        &self.main
    }

    /// Declared entry-point class, if any.
    pub fn main_class(&self) -> Option<&str> {
        self.main
            .get(MAIN_CLASS)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn is_multi_release(&self) -> bool {
        self.main
            .get(MULTI_RELEASE)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }

    /// Look up a package attribute: the `<package path>/` section first, then
    /// the main block.
    pub fn package_attribute(&self, package_path: &str, name: &str) -> Option<&str> {
        let section_key = format!("{}/", package_path.trim_end_matches('/'));
        self.sections
            .get(&section_key)
            .and_then(|section| section.get(name))
            .or_else(|| self.main.get(name))
    }

    /// Whether the descriptor seals the given package (`com/foo` form).
    pub fn is_sealed(&self, package_path: &str) -> bool {
        self.package_attribute(package_path, SEALED)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Manifest-Version: 1.0\r\n\
Main-Class: com.x.Main\r\n\
Multi-Release: true\r\n\
Implementation-Title: util\r\n\
Implementation-Vendor: Example Corp with a very long vendor name that wra\r\n \
ps onto the next line\r\n\
\r\n\
Name: com/x/sealed/\r\n\
Sealed: true\r\n\
Implementation-Title: sealed-part\r\n\
\r\n";

    #[test]
    fn parses_main_attributes() {
        let d = Descriptor::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(d.main_class(), Some("com.x.Main"));
        assert!(d.is_multi_release());
        assert_eq!(
            d.main_attributes().get("implementation-vendor"),
            Some("Example Corp with a very long vendor name that wraps onto the next line")
        );
    }

    #[test]
    fn package_section_overrides_main_block() {
        let d = Descriptor::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(
            d.package_attribute("com/x/sealed", IMPLEMENTATION_TITLE),
            Some("sealed-part")
        );
        assert_eq!(d.package_attribute("com/x", IMPLEMENTATION_TITLE), Some("util"));
        assert!(d.is_sealed("com/x/sealed"));
        assert!(!d.is_sealed("com/x"));
    }

    #[test]
    fn empty_descriptor_has_no_main_class() {
        let d = Descriptor::parse(b"Manifest-Version: 1.0\n").unwrap();
        assert_eq!(d.main_class(), None);
        assert!(!d.is_multi_release());
    }

    #[test]
    fn rejects_lines_without_separator() {
        let err = Descriptor::parse(b"Manifest-Version 1.0\n").unwrap_err();
        assert!(matches!(err, LoaderError::MalformedInput(_)));
    }

    #[test]
    fn rejects_sections_without_name() {
        let err = Descriptor::parse(b"A: b\n\nSealed: true\n").unwrap_err();
        assert!(matches!(err, LoaderError::MalformedInput(_)));
    }
}
