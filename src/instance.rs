//! Reads files into DICOM instances ready for C-STORE.

use std::path::{Path, PathBuf};

use dicom_dictionary_std::tags;
use dicom_object::{DefaultDicomObject, InMemDicomObject};
use thiserror::Error;

/// The file is not a readable DICOM Part 10 file
#[derive(Debug, Error)]
#[error("failed to decode {path}: {message}")]
pub struct DecodeError {
    pub path: PathBuf,
    pub message: String,
}

/// One decoded instance, alive for a single send-loop iteration
#[derive(Debug)]
pub struct InstanceRecord {
    pub path: PathBuf,
    pub dataset: DefaultDicomObject,
    /// Number of Frames, 1 when absent or unparseable
    pub frames: u32,
}

impl InstanceRecord {
    pub fn sop_class_uid(&self) -> &str {
        self.dataset
            .meta()
            .media_storage_sop_class_uid()
            .trim_end_matches('\0')
    }

    pub fn sop_instance_uid(&self) -> &str {
        self.dataset
            .meta()
            .media_storage_sop_instance_uid()
            .trim_end_matches('\0')
    }

    pub fn transfer_syntax(&self) -> &str {
        self.dataset.meta().transfer_syntax().trim_end_matches('\0')
    }

    /// File name for log lines
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

pub fn read_instance(path: &Path) -> Result<InstanceRecord, DecodeError> {
    let dataset = dicom_object::open_file(path).map_err(|e| DecodeError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let frames = frame_count(&dataset);

    Ok(InstanceRecord {
        path: path.to_path_buf(),
        dataset,
        frames,
    })
}

pub fn frame_count(obj: &InMemDicomObject) -> u32 {
    obj.element(tags::NUMBER_OF_FRAMES)
        .ok()
        .and_then(|e| e.to_int::<u32>().ok())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{DataElement, PrimitiveValue, VR};
    use dicom_dictionary_std::uids;
    use dicom_object::meta::FileMetaTableBuilder;
    use tempfile::TempDir;

    fn write_mr(path: &Path, instance_uid: &str, frames: Option<&str>) {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(
            tags::SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(uids::MR_IMAGE_STORAGE),
        ));
        obj.put(DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(instance_uid),
        ));
        if let Some(frames) = frames {
            obj.put(DataElement::new(
                tags::NUMBER_OF_FRAMES,
                VR::IS,
                PrimitiveValue::from(frames),
            ));
        }
        obj.with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                .media_storage_sop_class_uid(uids::MR_IMAGE_STORAGE)
                .media_storage_sop_instance_uid(instance_uid),
        )
        .unwrap()
        .write_to_file(path)
        .unwrap();
    }

    #[test]
    fn test_read_instance_defaults_to_one_frame() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("img1.dcm");
        write_mr(&path, "2.25.00001", None);

        let record = read_instance(&path).unwrap();
        assert_eq!(record.frames, 1);
        assert_eq!(record.sop_class_uid(), uids::MR_IMAGE_STORAGE);
        assert_eq!(record.sop_instance_uid(), "2.25.00001");
        assert_eq!(record.transfer_syntax(), uids::EXPLICIT_VR_LITTLE_ENDIAN);
        assert_eq!(record.file_name(), "img1.dcm");
    }

    #[test]
    fn test_read_instance_multiframe() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cine.dcm");
        write_mr(&path, "2.25.00002", Some("24"));

        assert_eq!(read_instance(&path).unwrap().frames, 24);
    }

    #[test]
    fn test_unparseable_frame_count_defaults_to_one() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("odd.dcm");
        write_mr(&path, "2.25.00003", Some("many"));

        assert_eq!(read_instance(&path).unwrap().frames, 1);
    }

    #[test]
    fn test_non_dicom_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("README.txt");
        std::fs::write(&path, "not an image").unwrap();

        let err = read_instance(&path).unwrap_err();
        assert_eq!(err.path, path);
    }
}
