//! Data sources that hand dense arrays to the array engine.
//!
//! A [`DataSource`] knows a set of variables, each described by a
//! [`VariableDescriptor`], and can read the raw row-major bytes behind
//! each one. Decoding, sectioning and materialising are shared default
//! methods, so a new backend only has to produce bytes.

use crate::array::Array;
use crate::error::{ArrayError, Result};
use crate::section::Section;
use crate::types::{ByteOrder, DataType};
use crate::utils::{checked_size, decode_array, encode_storage};
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::try_join_all;
use log::{debug, trace, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Name of the variable manifest a [`FileSource`] keeps in its directory
pub const MANIFEST_FILE: &str = "variables.json";

/// Backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// In-process byte blobs
    Memory,
    /// Files in a local directory
    FileSystem,
}

impl SourceKind {
    /// Parse the backend from a URL scheme; a bare path means the filesystem
    pub fn from_url(url: &str) -> Result<Self> {
        match url.split_once("://") {
            Some(("file", _)) => Ok(SourceKind::FileSystem),
            Some(("mem", _)) => Ok(SourceKind::Memory),
            Some((scheme, _)) => Err(ArrayError::argument(format!(
                "unknown source scheme: {}",
                scheme
            ))),
            None => Ok(SourceKind::FileSystem),
        }
    }
}

/// Where and how a variable's elements are stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    pub name: String,

    pub data_type: DataType,

    pub shape: Vec<usize>,

    #[serde(default)]
    pub byte_order: ByteOrder,

    /// Integral elements hold unsigned bit patterns
    #[serde(default)]
    pub unsigned: bool,

    /// Position of the first element in the backing blob
    #[serde(default)]
    pub byte_offset: usize,

    /// Blob name relative to the source; defaults to the variable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl VariableDescriptor {
    pub fn new(name: impl Into<String>, data_type: DataType, shape: &[usize]) -> Self {
        Self {
            name: name.into(),
            data_type,
            shape: shape.to_vec(),
            byte_order: ByteOrder::default(),
            unsigned: false,
            byte_offset: 0,
            location: None,
            units: None,
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_unsigned(mut self, unsigned: bool) -> Self {
        self.unsigned = unsigned;
        self
    }

    pub fn with_offset(mut self, byte_offset: usize) -> Self {
        self.byte_offset = byte_offset;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Bytes the variable's elements occupy in its blob
    pub fn byte_len(&self) -> Result<usize> {
        checked_size(&self.shape)?
            .checked_mul(self.data_type.size_in_bytes())
            .ok_or_else(|| ArrayError::argument(format!("variable '{}' is too large", self.name)))
    }

    /// Blob name, falling back to the variable name
    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or(&self.name)
    }
}

/// Source of dense variable data
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Raw bytes of the blob backing `var`
    async fn read_raw(&self, var: &VariableDescriptor) -> Result<Bytes>;

    /// Variables this source can read
    fn variables(&self) -> Vec<VariableDescriptor>;

    fn kind(&self) -> SourceKind;

    /// Look up a variable by name
    fn find_variable(&self, name: &str) -> Result<VariableDescriptor> {
        match self.variables().into_iter().find(|v| v.name == name) {
            Some(var) => Ok(var),
            None => {
                warn!("variable '{}' not found in {:?} source", name, self.kind());
                Err(ArrayError::NotFound(format!("variable '{}'", name)))
            }
        }
    }

    /// Read every element of `var`
    async fn read_all(&self, var: &VariableDescriptor) -> Result<Array> {
        let raw = self.read_raw(var).await?;
        trace!(
            "decoding '{}' as {} {:?} from {} bytes at offset {}",
            var.name,
            var.data_type,
            var.shape,
            raw.len(),
            var.byte_offset
        );
        let array = decode_array(&raw, var.byte_offset, var.data_type, &var.shape, var.byte_order)?;
        Ok(array.with_unsigned(var.unsigned))
    }

    /// Read the part of `var` selected by `section`, as dense storage owned
    /// by the caller. The result keeps the variable's rank.
    async fn read_data(&self, var: &VariableDescriptor, section: &Section) -> Result<Array> {
        debug!("reading '{}' section {}", var.name, section);
        let whole = self.read_all(var).await?;
        whole.section_no_reduce(section)?.copy()
    }

    /// Read several sections concurrently; results follow request order
    async fn read_many(&self, requests: &[(VariableDescriptor, Section)]) -> Result<Vec<Array>> {
        debug!("reading {} sections", requests.len());
        try_join_all(
            requests
                .iter()
                .map(|(var, section)| self.read_data(var, section)),
        )
        .await
    }
}

/// Dense row-major bytes of an array in `order`
fn array_bytes(array: &Array, order: ByteOrder) -> Result<Bytes> {
    let dense = array.copy()?;
    let storage = dense.storage();
    encode_storage(&storage, order)
}

fn descriptor_for(name: &str, array: &Array, order: ByteOrder) -> VariableDescriptor {
    VariableDescriptor::new(name, array.data_type(), array.shape())
        .with_byte_order(order)
        .with_unsigned(array.is_unsigned())
}

fn check_blob(var: &VariableDescriptor, blob: &Bytes) -> Result<()> {
    let end = var
        .byte_len()?
        .checked_add(var.byte_offset)
        .ok_or_else(|| ArrayError::argument(format!("variable '{}' is too large", var.name)))?;
    if end > blob.len() {
        return Err(ArrayError::argument(format!(
            "variable '{}' needs {} bytes, blob has {}",
            var.name,
            end,
            blob.len()
        )));
    }
    Ok(())
}

/// Variables held in memory as byte blobs
#[derive(Debug, Default)]
pub struct MemorySource {
    entries: RwLock<BTreeMap<String, (VariableDescriptor, Bytes)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable with its backing blob, replacing any variable of
    /// the same name
    pub fn add_variable(&self, var: VariableDescriptor, blob: Bytes) -> Result<()> {
        check_blob(&var, &blob)?;
        self.entries.write().insert(var.name.clone(), (var, blob));
        Ok(())
    }

    /// Encode `array` densely in `order` and register it under `name`
    pub fn insert_array(
        &self,
        name: &str,
        array: &Array,
        order: ByteOrder,
    ) -> Result<VariableDescriptor> {
        let var = descriptor_for(name, array, order);
        self.add_variable(var.clone(), array_bytes(array, order)?)?;
        Ok(var)
    }

    pub fn remove_variable(&self, name: &str) -> Option<VariableDescriptor> {
        self.entries.write().remove(name).map(|(var, _)| var)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn read_raw(&self, var: &VariableDescriptor) -> Result<Bytes> {
        match self.entries.read().get(&var.name) {
            Some((_, blob)) => Ok(blob.clone()),
            None => {
                warn!("no blob for variable '{}'", var.name);
                Err(ArrayError::NotFound(format!("variable '{}'", var.name)))
            }
        }
    }

    fn variables(&self) -> Vec<VariableDescriptor> {
        self.entries.read().values().map(|(var, _)| var.clone()).collect()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Memory
    }
}

/// Variables stored as raw files in a directory, described by a JSON
/// manifest
#[derive(Debug)]
pub struct FileSource {
    base_path: PathBuf,
    variables: RwLock<Vec<VariableDescriptor>>,
}

impl FileSource {
    /// Source over `base_path` with no variables registered
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            variables: RwLock::new(Vec::new()),
        }
    }

    /// Open a directory and load its variable manifest
    pub async fn open(base_path: impl AsRef<Path>) -> Result<Self> {
        let source = Self::new(base_path);
        let manifest = source.base_path.join(MANIFEST_FILE);
        debug!("loading manifest {}", manifest.display());
        let text = match fs::read_to_string(&manifest).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("manifest {} not found", manifest.display());
                return Err(ArrayError::NotFound(manifest.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let variables: Vec<VariableDescriptor> = serde_json::from_str(&text)?;
        *source.variables.write() = variables;
        Ok(source)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Register a variable whose blob already exists on disk
    pub fn with_variable(self, var: VariableDescriptor) -> Self {
        self.register(var);
        self
    }

    fn register(&self, var: VariableDescriptor) {
        let mut vars = self.variables.write();
        vars.retain(|v| v.name != var.name);
        vars.push(var);
    }

    fn full_path(&self, var: &VariableDescriptor) -> PathBuf {
        self.base_path.join(var.location())
    }

    /// Write `array` densely in `order` to a file named after the variable
    /// and register it
    pub async fn write_array(
        &self,
        name: &str,
        array: &Array,
        order: ByteOrder,
    ) -> Result<VariableDescriptor> {
        let var = descriptor_for(name, array, order);
        let bytes = array_bytes(array, order)?;
        let path = self.full_path(&var);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(&path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        debug!("wrote {} bytes to {}", bytes.len(), path.display());
        self.register(var.clone());
        Ok(var)
    }

    /// Persist the registered variables to the manifest file
    pub async fn save_manifest(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&*self.variables.read())?;
        fs::create_dir_all(&self.base_path).await?;
        fs::write(self.base_path.join(MANIFEST_FILE), json).await?;
        Ok(())
    }
}

#[async_trait]
impl DataSource for FileSource {
    async fn read_raw(&self, var: &VariableDescriptor) -> Result<Bytes> {
        let path = self.full_path(var);
        debug!("reading {}", path.display());
        let blob = match fs::read(&path).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("file for variable '{}' not found: {}", var.name, path.display());
                return Err(ArrayError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        check_blob(var, &blob)?;
        Ok(blob)
    }

    fn variables(&self) -> Vec<VariableDescriptor> {
        self.variables.read().clone()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::FileSystem
    }
}

/// Open a source from a URL: `mem://` gives an empty [`MemorySource`],
/// `file://path` or a bare path opens a [`FileSource`] and its manifest
pub async fn open_source(url: &str) -> Result<Box<dyn DataSource>> {
    match SourceKind::from_url(url)? {
        SourceKind::Memory => Ok(Box::new(MemorySource::new())),
        SourceKind::FileSystem => {
            let path = url.strip_prefix("file://").unwrap_or(url);
            Ok(Box::new(FileSource::open(path).await?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;
    use tempfile::TempDir;

    fn grid() -> Array {
        Array::from_vec(&[3, 4], (0..12).map(|v| v as f32).collect()).unwrap()
    }

    #[test]
    fn test_kind_from_url() {
        assert_eq!(SourceKind::from_url("file:///data").unwrap(), SourceKind::FileSystem);
        assert_eq!(SourceKind::from_url("mem://").unwrap(), SourceKind::Memory);
        assert_eq!(SourceKind::from_url("/tmp/x").unwrap(), SourceKind::FileSystem);
        assert!(SourceKind::from_url("s3://bucket").is_err());
    }

    #[test]
    fn test_descriptor_json() {
        let json = r#"{"name": "t", "data_type": "Short", "shape": [2, 5], "unsigned": true}"#;
        let var: VariableDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(var.byte_order, ByteOrder::BigEndian);
        assert_eq!(var.byte_len().unwrap(), 20);
        assert_eq!(var.location(), "t");
        assert!(var.unsigned);
    }

    #[tokio::test]
    async fn test_memory_read_section() {
        let source = MemorySource::new();
        let var = source
            .insert_array("grid", &grid(), ByteOrder::LittleEndian)
            .unwrap();
        assert_eq!(source.len(), 1);

        let all = source.read_all(&var).await.unwrap();
        assert_eq!(all, grid());

        let section: Section = "1:2,0:3:2".parse().unwrap();
        let part = source.read_data(&var, &section).await.unwrap();
        assert_eq!(part.shape(), &[2, 2]);
        assert_eq!(part.to_vec::<f32>().unwrap(), vec![4.0, 6.0, 8.0, 10.0]);
        assert!(!part.shares_storage(&all));
    }

    #[tokio::test]
    async fn test_memory_offset_and_unsigned() {
        let source = MemorySource::new();
        let var = VariableDescriptor::new("b", DataType::Byte, &[3])
            .with_offset(2)
            .with_unsigned(true);
        source
            .add_variable(var.clone(), Bytes::from_static(&[0, 0, 1, 200, 255]))
            .unwrap();
        let arr = source.read_all(&var).await.unwrap();
        assert!(arr.is_unsigned());
        assert_eq!(arr.get_i64(&[1]).unwrap(), 200);
        assert_eq!(arr.get_i64(&[2]).unwrap(), 255);

        let too_long = VariableDescriptor::new("c", DataType::Int, &[2]);
        assert!(source
            .add_variable(too_long, Bytes::from_static(&[0; 7]))
            .is_err());
    }

    #[tokio::test]
    async fn test_not_found() {
        let source = MemorySource::new();
        let ghost = VariableDescriptor::new("ghost", DataType::Int, &[1]);
        assert!(matches!(
            source.read_all(&ghost).await,
            Err(ArrayError::NotFound(_))
        ));
        assert!(matches!(
            source.find_variable("ghost"),
            Err(ArrayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_read_many_keeps_order() {
        let source = MemorySource::new();
        let var = source.insert_array("grid", &grid(), ByteOrder::BigEndian).unwrap();
        let requests: Vec<_> = (0..3)
            .map(|row| (var.clone(), Section::new(vec![Some(Range::new(row, row).unwrap()), None])))
            .collect();
        let rows = source.read_many(&requests).await.unwrap();
        assert_eq!(rows.len(), 3);
        for (row, arr) in rows.iter().enumerate() {
            assert_eq!(arr.get_f32(&[0, 0]).unwrap(), (row * 4) as f32);
        }
    }

    #[tokio::test]
    async fn test_file_source_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let source = FileSource::new(temp_dir.path());
        let var = source
            .write_array("grid", &grid().transpose(0, 1).unwrap(), ByteOrder::BigEndian)
            .await
            .unwrap();
        assert_eq!(var.shape, vec![4, 3]);
        source.save_manifest().await.unwrap();

        let reopened = open_source(&format!("file://{}", temp_dir.path().display()))
            .await
            .unwrap();
        assert_eq!(reopened.kind(), SourceKind::FileSystem);
        let var = reopened.find_variable("grid").unwrap();
        let arr = reopened.read_all(&var).await.unwrap();
        assert_eq!(arr.get_f32(&[3, 1]).unwrap(), 7.0);
    }

    #[tokio::test]
    async fn test_file_source_missing() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            FileSource::open(temp_dir.path()).await,
            Err(ArrayError::NotFound(_))
        ));
        let source = FileSource::new(temp_dir.path())
            .with_variable(VariableDescriptor::new("x", DataType::Double, &[2]));
        let var = source.find_variable("x").unwrap();
        assert!(matches!(
            source.read_all(&var).await,
            Err(ArrayError::NotFound(_))
        ));
    }
}
