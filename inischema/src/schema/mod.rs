// Schema model - the structural contract a source must satisfy

use crate::document::{IniFile, IniSect, IniValue};
use crate::error::{Error, Result};
use crate::index::{self, OrderedIndex};
use crate::value::{OptionType, Value};
use std::fmt;

/// What a post-parse hook reports back to the fixpoint driver.
pub enum HookOutcome {
    /// Check complete.
    Done,
    /// Check complete, with an advisory for the caller's warning sink.
    Warn(String),
    /// Dependencies not ready yet; retry on a later pass.
    Defer,
}

/// Cross-value check run after raw parsing. Receives the value, its owning
/// section (or instance), and the whole document, so it can depend on other
/// values regardless of declaration order. `Err` is fatal with the message
/// text. Hook data lives in the closure's captures.
pub type PostParseHook =
    Box<dyn Fn(&IniValue, &IniSect, &IniFile) -> std::result::Result<HookOutcome, String>>;

/// Constraint flags for a section schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionFlags {
    /// The source must contain this section.
    pub required: bool,
    /// Section takes keyed instances (`[Title:ID]`) instead of values.
    pub multiple: bool,
    /// A concrete section/instance must hold at least one value.
    pub not_empty: bool,
    /// Synthesize the section with its defaults when the source omits it.
    pub create_if_absent: bool,
}

/// Declared shape of one option: its type plus constraints.
pub struct OptionSchema {
    name: String,
    ty: &'static dyn OptionType,
    required: bool,
    default: Option<Value>,
    hook: Option<PostParseHook>,
}

impl OptionSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &'static dyn OptionType {
        self.ty
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub(crate) fn hook(&self) -> Option<&PostParseHook> {
        self.hook.as_ref()
    }
}

impl fmt::Debug for OptionSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionSchema")
            .field("name", &self.name)
            .field("type", &self.ty.name())
            .field("required", &self.required)
            .field("default", &self.default)
            .field("has_hook", &self.hook.is_some())
            .finish()
    }
}

/// Descriptor for [`SectionSchema::add_option`] and the batch variant.
pub struct OptionDecl {
    name: String,
    ty: &'static dyn OptionType,
    required: bool,
    default: Option<Value>,
    hook: Option<PostParseHook>,
}

impl OptionDecl {
    pub fn new(name: impl Into<String>, ty: &'static dyn OptionType) -> Self {
        OptionDecl {
            name: name.into(),
            ty,
            required: false,
            default: None,
            hook: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn post_parse<F>(mut self, hook: F) -> Self
    where
        F: Fn(&IniValue, &IniSect, &IniFile) -> std::result::Result<HookOutcome, String>
            + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }
}

/// Declared shape of one section and its options.
#[derive(Debug)]
pub struct SectionSchema {
    name: String,
    flags: SectionFlags,
    options: OrderedIndex<OptionSchema>,
}

impl SectionSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> SectionFlags {
        self.flags
    }

    pub fn option(&self, name: &str) -> Option<&OptionSchema> {
        self.options.get(name)
    }

    pub fn options(&self) -> index::Iter<'_, OptionSchema> {
        self.options.iter()
    }

    /// Add one option. The declared default, if any, must be a value of the
    /// declared type.
    pub fn add_option(&mut self, decl: OptionDecl) -> Result<()> {
        if let Some(default) = &decl.default {
            if !decl.ty.accepts(default) {
                return Err(Error::Schema(format!(
                    "Default value for option '[{}]:{}' is not of type {}",
                    self.name,
                    decl.name,
                    decl.ty.name()
                )));
            }
        }

        let schema = OptionSchema {
            name: decl.name.clone(),
            ty: decl.ty,
            required: decl.required,
            default: decl.default,
            hook: decl.hook,
        };
        if !self.options.insert(decl.name.clone(), schema) {
            return Err(Error::Schema(format!(
                "Schema option '[{}]:{}' already exists",
                self.name, decl.name
            )));
        }
        Ok(())
    }

    /// Add a batch of options in order, stopping at the first failure.
    /// Options added before the failure are NOT rolled back; on error the
    /// whole schema should be discarded.
    pub fn add_options(&mut self, decls: Vec<OptionDecl>) -> Result<()> {
        for decl in decls {
            self.add_option(decl)?;
        }
        Ok(())
    }
}

/// Descriptor for [`FileSchema::add_sections`].
pub struct SectionDecl {
    name: String,
    flags: SectionFlags,
    options: Vec<OptionDecl>,
}

impl SectionDecl {
    pub fn new(name: impl Into<String>, flags: SectionFlags) -> Self {
        SectionDecl {
            name: name.into(),
            flags,
            options: Vec::new(),
        }
    }

    pub fn option(mut self, decl: OptionDecl) -> Self {
        self.options.push(decl);
        self
    }
}

/// The full schema for one file format: a name-indexed set of section
/// schemas. Built once, then read-only -- a schema may back any number of
/// parses, concurrently included.
#[derive(Debug, Default)]
pub struct FileSchema {
    sections: OrderedIndex<SectionSchema>,
}

impl FileSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self, name: &str) -> Option<&SectionSchema> {
        self.sections.get(name)
    }

    pub fn sections(&self) -> index::Iter<'_, SectionSchema> {
        self.sections.iter()
    }

    /// Add one empty section schema and hand it back for option population.
    pub fn add_section(&mut self, name: &str, flags: SectionFlags) -> Result<&mut SectionSchema> {
        let schema = SectionSchema {
            name: name.to_string(),
            flags,
            options: OrderedIndex::new(),
        };
        if !self.sections.insert(name, schema) {
            return Err(Error::Schema(format!(
                "Schema section '{name}' already exists"
            )));
        }
        self.sections
            .get_mut(name)
            .ok_or_else(|| Error::Schema(format!("Schema section '{name}' not found")))
    }

    /// Add a batch of sections (with their options) in order, stopping at
    /// the first failure. Sections added before the failure are NOT rolled
    /// back; on error the whole schema should be discarded.
    pub fn add_sections(&mut self, decls: Vec<SectionDecl>) -> Result<()> {
        for decl in decls {
            let sect = self.add_section(&decl.name, decl.flags)?;
            sect.add_options(decl.options)?;
        }
        Ok(())
    }
}
