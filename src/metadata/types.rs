//! METADATA document model (core metadata, RFC 822 style headers)

use std::fmt::Write;

use crate::error::MetadataError;

/// A single `Name: value` header. Continuation lines are kept verbatim in
/// `value`, joined by `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Parsed METADATA file.
///
/// Headers are kept as an ordered list so repeated fields (`Classifier`,
/// `Requires-Dist`, ...) and unknown fields survive a round trip in their
/// original relative order. Field names compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    headers: Vec<Header>,
    body: Option<String>,
}

impl Metadata {
    /// Parse metadata, requiring the `Name` and `Version` fields
    pub fn parse(content: &str) -> Result<Self, MetadataError> {
        let metadata = Self::parse_headers(content)?;

        for required in ["Name", "Version"] {
            if metadata.get(required).map_or(true, str::is_empty) {
                return Err(MetadataError::MissingField(required.to_string()));
            }
        }

        Ok(metadata)
    }

    /// Parse raw bytes, which must be UTF-8
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MetadataError> {
        Self::parse(decode_utf8(bytes)?)
    }

    /// Parse the header/body structure without checking for required fields.
    ///
    /// Also used for the WHEEL file, which shares the format.
    pub fn parse_headers(content: &str) -> Result<Self, MetadataError> {
        let mut metadata = Metadata::default();
        let mut consumed = 0;

        for (index, raw_line) in content.split_inclusive('\n').enumerate() {
            consumed += raw_line.len();
            let line = raw_line.trim_end_matches(['\n', '\r']);

            // First blank line ends the headers; the rest is the body, verbatim
            if line.is_empty() {
                metadata.body = Some(content[consumed..].to_string());
                break;
            }

            if line.starts_with([' ', '\t']) {
                match metadata.headers.last_mut() {
                    Some(header) => {
                        header.value.push('\n');
                        header.value.push_str(line);
                    }
                    None => {
                        return Err(MetadataError::Malformed {
                            line: index + 1,
                            content: line.to_string(),
                        })
                    }
                }
                continue;
            }

            match line.split_once(':') {
                Some((name, value)) if is_field_name(name) => {
                    metadata.headers.push(Header {
                        name: name.to_string(),
                        value: value.trim().to_string(),
                    });
                }
                _ => {
                    return Err(MetadataError::Malformed {
                        line: index + 1,
                        content: line.to_string(),
                    })
                }
            }
        }

        Ok(metadata)
    }

    /// Serialize metadata back to RFC822 format
    pub fn serialize(&self) -> String {
        let mut output = String::new();

        for header in &self.headers {
            if header.value.is_empty() {
                writeln!(output, "{}:", header.name).unwrap();
            } else {
                writeln!(output, "{}: {}", header.name, header.value).unwrap();
            }
        }

        if let Some(ref body) = self.body {
            output.push('\n');
            output.push_str(body);
        }

        output
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.serialize().into_bytes()
    }

    /// All headers in document order
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Free-text body following the headers (usually the long description)
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// First value of a field
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Every value of a (possibly repeated) field, in document order
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// Mapping view: each distinct field with all of its values, ordered by
    /// first occurrence. The spelling of the first occurrence is used.
    pub fn fields(&self) -> Vec<(&str, Vec<&str>)> {
        let mut fields: Vec<(&str, Vec<&str>)> = Vec::new();
        for header in &self.headers {
            match fields
                .iter_mut()
                .find(|(name, _)| name.eq_ignore_ascii_case(&header.name))
            {
                Some((_, values)) => values.push(&header.value),
                None => fields.push((&header.name, vec![&header.value])),
            }
        }
        fields
    }

    pub fn name(&self) -> &str {
        self.get("Name").unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        self.get("Version").unwrap_or_default()
    }

    /// Replace every occurrence of `name` with a single value at the position
    /// of the first occurrence, or append it if the field is absent.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .headers
            .iter()
            .position(|h| h.name.eq_ignore_ascii_case(name))
        {
            Some(first) => {
                self.headers[first].value = value;
                let mut index = 0;
                self.headers.retain(|h| {
                    let keep = index <= first || !h.name.eq_ignore_ascii_case(name);
                    index += 1;
                    keep
                });
            }
            None => self.headers.push(Header {
                name: name.to_string(),
                value,
            }),
        }
    }

    /// Add a value after the last occurrence of `name` (or at the end)
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        let header = Header {
            name: name.to_string(),
            value: value.into(),
        };
        match self
            .headers
            .iter()
            .rposition(|h| h.name.eq_ignore_ascii_case(name))
        {
            Some(last) => {
                // Reuse the document's spelling of the field name
                let header = Header {
                    name: self.headers[last].name.clone(),
                    ..header
                };
                self.headers.insert(last + 1, header);
            }
            None => self.headers.push(header),
        }
    }

    /// Remove every occurrence of `name`, returning how many were removed
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.headers.len();
        self.headers.retain(|h| !h.name.eq_ignore_ascii_case(name));
        before - self.headers.len()
    }

    pub fn set_body(&mut self, body: Option<String>) {
        self.body = body;
    }
}

fn is_field_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_graphic() && c != ':')
}

pub(crate) fn decode_utf8(bytes: &[u8]) -> Result<&str, MetadataError> {
    std::str::from_utf8(bytes).map_err(|e| {
        let line = bytes[..e.valid_up_to()]
            .iter()
            .filter(|&&b| b == b'\n')
            .count()
            + 1;
        MetadataError::Malformed {
            line,
            content: "invalid UTF-8".to_string(),
        }
    })
}
