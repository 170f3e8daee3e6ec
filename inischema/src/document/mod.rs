// Parsed document model - file, sections, keyed instances, typed values

use crate::error::{Error, Result};
use crate::index::{self, OrderedIndex};
use crate::schema::{FileSchema, OptionSchema, SectionSchema};
use crate::value::Value;
use std::cell::Cell;

/// A fully parsed source: the document root.
///
/// Borrows the schema it was parsed against; ownership below is strictly
/// tree-shaped, so dropping the file tears the whole document down. Not
/// `Sync` -- one document must not be shared across threads while post-parse
/// state is still settling.
#[derive(Debug)]
pub struct IniFile<'s> {
    schema: &'s FileSchema,
    sections: OrderedIndex<IniSect<'s>>,
}

impl<'s> IniFile<'s> {
    pub(crate) fn new(schema: &'s FileSchema) -> Self {
        IniFile {
            schema,
            sections: OrderedIndex::new(),
        }
    }

    pub fn schema(&self) -> &'s FileSchema {
        self.schema
    }

    /// Look up a section by title in O(log n).
    pub fn section(&self, name: &str) -> Option<&IniSect<'s>> {
        self.sections.get(name)
    }

    pub fn sections(&self) -> index::Iter<'_, IniSect<'s>> {
        self.sections.iter()
    }

    pub(crate) fn section_mut(&mut self, name: &str) -> Option<&mut IniSect<'s>> {
        self.sections.get_mut(name)
    }

    /// Find the document node for a schema section, creating it on first
    /// use. The node is named after the schema; its body shape comes from
    /// the `multiple` flag.
    pub(crate) fn ensure_section(&mut self, schema: &'s SectionSchema) -> Result<&mut IniSect<'s>> {
        if self.sections.get(schema.name()).is_none() {
            self.add_section(schema)?;
        }
        self.sections
            .get_mut(schema.name())
            .ok_or_else(|| Error::Parse(format!("Section [{}] not found", schema.name())))
    }

    pub(crate) fn add_section(&mut self, schema: &'s SectionSchema) -> Result<()> {
        let sect = IniSect::new(schema, schema.name().to_string());
        if !self.sections.insert(schema.name(), sect) {
            return Err(Error::Parse(format!(
                "Duplicate section [{}]",
                schema.name()
            )));
        }
        Ok(())
    }
}

/// Body of a section node, fixed at creation from the schema's `multiple`
/// flag: plain sections hold values, multiple sections hold instances.
#[derive(Debug)]
pub enum SectionBody<'s> {
    Values(OrderedIndex<IniValue<'s>>),
    Instances(OrderedIndex<IniSect<'s>>),
}

/// A concrete section: either a plain `[Title]` node, the wrapper node for
/// a multiple section, or one `[Title:ID]` instance under such a wrapper.
#[derive(Debug)]
pub struct IniSect<'s> {
    schema: &'s SectionSchema,
    /// Section title, or the instance ID under a multiple section.
    name: String,
    body: SectionBody<'s>,
}

impl<'s> IniSect<'s> {
    /// Only the schema-named node is built here; instances are created by
    /// [`IniSect::add_instance`] and always hold values.
    pub(crate) fn new(schema: &'s SectionSchema, name: String) -> Self {
        let body = if schema.flags().multiple {
            SectionBody::Instances(OrderedIndex::new())
        } else {
            SectionBody::Values(OrderedIndex::new())
        };
        IniSect { schema, name, body }
    }

    pub fn schema(&self) -> &'s SectionSchema {
        self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &SectionBody<'s> {
        &self.body
    }

    /// Look up a value by option name. `None` for wrapper nodes of multiple
    /// sections, which hold instances instead.
    pub fn value(&self, name: &str) -> Option<&IniValue<'s>> {
        match &self.body {
            SectionBody::Values(values) => values.get(name),
            SectionBody::Instances(_) => None,
        }
    }

    /// Look up an instance by ID. `None` for plain sections.
    pub fn instance(&self, id: &str) -> Option<&IniSect<'s>> {
        match &self.body {
            SectionBody::Instances(instances) => instances.get(id),
            SectionBody::Values(_) => None,
        }
    }

    /// Whether the section holds no values (or no instances).
    pub fn is_empty(&self) -> bool {
        match &self.body {
            SectionBody::Values(values) => values.is_empty(),
            SectionBody::Instances(instances) => instances.is_empty(),
        }
    }

    /// Bracketed label for diagnostics: `[title]`, or `[title:id]` for an
    /// instance of a multiple section.
    pub(crate) fn label(&self) -> String {
        match &self.body {
            SectionBody::Values(_) if self.schema.flags().multiple => {
                format!("[{}:{}]", self.schema.name(), self.name)
            }
            _ => format!("[{}]", self.name),
        }
    }

    pub(crate) fn instance_mut(&mut self, id: &str) -> Option<&mut IniSect<'s>> {
        match &mut self.body {
            SectionBody::Instances(instances) => instances.get_mut(id),
            SectionBody::Values(_) => None,
        }
    }

    pub(crate) fn add_instance(&mut self, schema: &'s SectionSchema, id: String) -> Result<()> {
        let label = format!("[{}:{}]", schema.name(), id);
        let inst = IniSect {
            schema,
            name: id.clone(),
            body: SectionBody::Values(OrderedIndex::new()),
        };
        match &mut self.body {
            SectionBody::Instances(instances) => {
                if !instances.insert(id, inst) {
                    return Err(Error::Parse(format!("Duplicate section {label}")));
                }
                Ok(())
            }
            SectionBody::Values(_) => Err(Error::Parse(format!(
                "Section [{}] does not take instances",
                self.name
            ))),
        }
    }

    pub(crate) fn add_value(&mut self, schema: &'s OptionSchema, value: Value) -> Result<()> {
        match &mut self.body {
            SectionBody::Values(values) => {
                let entry = IniValue {
                    schema,
                    post_parse_done: Cell::new(false),
                    value,
                };
                if !values.insert(schema.name(), entry) {
                    return Err(Error::Parse(format!(
                        "Duplicate value {}:{}",
                        self.label(),
                        schema.name()
                    )));
                }
                Ok(())
            }
            SectionBody::Instances(_) => Err(Error::Parse(format!(
                "Section [{}] does not take values",
                self.name
            ))),
        }
    }
}

/// One parsed option value inside a section or instance.
#[derive(Debug)]
pub struct IniValue<'s> {
    schema: &'s OptionSchema,
    /// Flips false -> true exactly once, when the post-parse hook succeeds.
    post_parse_done: Cell<bool>,
    value: Value,
}

impl<'s> IniValue<'s> {
    pub fn schema(&self) -> &'s OptionSchema {
        self.schema
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn post_parse_done(&self) -> bool {
        self.post_parse_done.get()
    }

    pub(crate) fn mark_done(&self) {
        self.post_parse_done.set(true);
    }
}
