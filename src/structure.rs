//! Record schemas: named, typed, offset-located members of a fixed-size record

use crate::error::{ArrayError, Result};
use crate::types::{ByteOrder, DataType};
use crate::utils::checked_size;
use serde::{Deserialize, Serialize};

/// One field of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Field name, unique within its schema
    pub name: String,

    /// Element kind
    pub data_type: DataType,

    /// Per-record shape; empty for a scalar
    #[serde(default)]
    pub shape: Vec<usize>,

    /// Byte offset of the field from the start of the record
    #[serde(default)]
    pub byte_offset: usize,

    /// Schema of a nested record, required for `DataType::Structure`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<StructureMembers>,

    /// Byte order for this field, overriding the buffer's order. On a
    /// structure member it is the default order of the nested members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_order: Option<ByteOrder>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl Member {
    /// Create a member at byte offset 0
    pub fn new(name: impl Into<String>, data_type: DataType, shape: &[usize]) -> Self {
        Self {
            name: name.into(),
            data_type,
            shape: shape.to_vec(),
            byte_offset: 0,
            members: None,
            byte_order: None,
            description: None,
            units: None,
        }
    }

    /// Create a nested-record member
    pub fn structure(name: impl Into<String>, members: StructureMembers, shape: &[usize]) -> Self {
        Self::new(name, DataType::Structure, shape).with_members(members)
    }

    pub fn with_offset(mut self, byte_offset: usize) -> Self {
        self.byte_offset = byte_offset;
        self
    }

    pub fn with_members(mut self, members: StructureMembers) -> Self {
        self.members = Some(members);
        self
    }

    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = Some(order);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Number of elements per record
    pub fn size(&self) -> Result<usize> {
        checked_size(&self.shape)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.size(), Ok(1))
    }

    /// Bytes per element: the nested record size for structures, one byte
    /// for opaque fields
    pub fn element_size(&self) -> Result<usize> {
        match self.data_type {
            DataType::Structure => self
                .nested()?
                .structure_size()
                .ok_or_else(|| {
                    ArrayError::argument(format!(
                        "nested schema of member '{}' has no record size",
                        self.name
                    ))
                }),
            DataType::Opaque => Ok(1),
            kind => Ok(kind.size_in_bytes()),
        }
    }

    /// Bytes the member occupies inside one record
    pub fn byte_extent(&self) -> Result<usize> {
        self.size()?
            .checked_mul(self.element_size()?)
            .ok_or_else(|| ArrayError::argument(format!("member '{}' is too large", self.name)))
    }

    /// The nested schema of a structure member
    pub fn nested(&self) -> Result<&StructureMembers> {
        self.members.as_ref().ok_or_else(|| {
            ArrayError::argument(format!("member '{}' has no nested schema", self.name))
        })
    }
}

/// Schema of a fixed-size record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructureMembers {
    name: String,
    members: Vec<Member>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    structure_size: Option<usize>,
}

impl StructureMembers {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            structure_size: None,
        }
    }

    /// Add a member
    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    /// Set the record size; see [`StructureMembers::set_structure_size`]
    pub fn with_structure_size(mut self, size: usize) -> Result<Self> {
        self.set_structure_size(size)?;
        Ok(self)
    }

    pub fn add_member(&mut self, member: Member) {
        self.members.push(member);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn find_member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Like [`StructureMembers::find_member`], failing when absent
    pub fn member(&self, name: &str) -> Result<&Member> {
        self.find_member(name).ok_or_else(|| {
            ArrayError::argument(format!("no member '{}' in structure '{}'", name, self.name))
        })
    }

    /// Record size in bytes, once set
    pub fn structure_size(&self) -> Option<usize> {
        self.structure_size
    }

    /// Smallest record size covering every member
    pub fn min_structure_size(&self) -> Result<usize> {
        self.members.iter().try_fold(0usize, |acc, m| {
            let end = m
                .byte_offset
                .checked_add(m.byte_extent()?)
                .ok_or_else(|| ArrayError::argument(format!("member '{}' is too large", m.name)))?;
            Ok(acc.max(end))
        })
    }

    /// Set the record size. It can be set only once and must cover every
    /// member; trailing and inter-member padding is allowed.
    pub fn set_structure_size(&mut self, size: usize) -> Result<()> {
        if let Some(existing) = self.structure_size {
            return Err(ArrayError::argument(format!(
                "structure '{}' already has record size {}",
                self.name, existing
            )));
        }
        let needed = self.min_structure_size()?;
        if size < needed {
            return Err(ArrayError::argument(format!(
                "record size {} of '{}' does not cover members ending at byte {}",
                size, self.name, needed
            )));
        }
        self.structure_size = Some(size);
        Ok(())
    }

    /// Check the record size is set and covers every member, recursively
    pub fn validate(&self) -> Result<usize> {
        let size = self.structure_size.ok_or_else(|| {
            ArrayError::argument(format!("structure '{}' has no record size", self.name))
        })?;
        for m in &self.members {
            if m.data_type == DataType::Structure {
                m.nested()?.validate()?;
            }
        }
        let needed = self.min_structure_size()?;
        if size < needed {
            return Err(ArrayError::argument(format!(
                "record size {} of '{}' does not cover members ending at byte {}",
                size, self.name, needed
            )));
        }
        Ok(size)
    }

    /// Lay members out back to back in declaration order, without padding,
    /// and set the record size. Nested schemas without a size are laid out
    /// first.
    pub fn assign_offsets(&mut self) -> Result<usize> {
        if self.structure_size.is_some() {
            return Err(ArrayError::argument(format!(
                "structure '{}' already has a record size",
                self.name
            )));
        }
        let mut offset = 0usize;
        for m in &mut self.members {
            if let Some(nested) = m.members.as_mut() {
                if nested.structure_size.is_none() {
                    nested.assign_offsets()?;
                }
            }
            m.byte_offset = offset;
            offset = offset
                .checked_add(m.byte_extent()?)
                .ok_or_else(|| ArrayError::argument("record layout overflows"))?;
        }
        self.structure_size = Some(offset);
        Ok(offset)
    }

    /// Load a schema from its JSON description
    pub fn from_json(json: &str) -> Result<Self> {
        let schema: StructureMembers = serde_json::from_str(json)?;
        Ok(schema)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
