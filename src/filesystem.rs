// SPDX-License-Identifier: MIT OR Apache-2.0

pub trait ReadSeek: std::io::Read + std::io::Seek {}
impl<T: std::io::Read + std::io::Seek> ReadSeek for T {}

pub struct FileWrapper {
    pub file: Box<dyn ReadSeek>,
    pub size: usize,
}

pub fn open_file(path: &str) -> std::io::Result<FileWrapper> {
    let file = std::fs::File::open(path)?;
    let size = file.metadata()?.len() as usize;
    Ok(FileWrapper { file: Box::new(file), size })
}

pub fn get_filename(path: &str) -> String {
    let mut filename = path;
    if let Some(pos) = path.rfind('/').or_else(|| path.rfind('\\')) {
        filename = &path[pos + 1..];
    }
    filename.to_owned()
}

pub fn get_extension(path: &str) -> String {
    let filename = get_filename(path);
    if let Some(pos) = filename.rfind('.') {
        return filename[pos + 1..].to_ascii_lowercase();
    }
    Default::default()
}
