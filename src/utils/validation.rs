use regex::Regex;

/// Max CV upload size accepted by the ATS scorer and enhancement flows.
pub const MAX_CV_SIZE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_CV_EXTENSIONS: [&str; 3] = ["pdf", "docx", "doc"];

pub fn validate_email(email: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    re.is_match(email)
}

pub fn validate_password(password: &str) -> bool {
    password.len() >= 8
}

fn extension_of(filename: &str) -> Option<String> {
    let parts: Vec<&str> = filename.rsplitn(2, '.').collect();
    if parts.len() == 2 && !parts[1].is_empty() {
        Some(parts[0].to_lowercase())
    } else {
        None
    }
}

/// Checks a CV upload before it reaches the scorer. Only PDF and Word
/// documents are accepted, capped at 5MB.
pub fn validate_cv_file(filename: &str, file_size: usize) -> Result<(), String> {
    let ext = extension_of(filename)
        .ok_or_else(|| format!("'{}' has no file extension", filename))?;

    if !ALLOWED_CV_EXTENSIONS.contains(&ext.as_str()) {
        return Err(format!(
            "Unsupported file type '.{}'. Please upload a .pdf, .docx or .doc file",
            ext
        ));
    }

    if file_size == 0 {
        return Err("Uploaded file is empty".to_string());
    }

    if file_size > MAX_CV_SIZE_BYTES {
        return Err(format!(
            "File is {:.1}MB; the maximum allowed size is 5MB",
            file_size as f64 / (1024.0 * 1024.0)
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_pdf_docx_doc() {
        assert!(validate_cv_file("resume.pdf", 1024).is_ok());
        assert!(validate_cv_file("resume.DOCX", 1024).is_ok());
        assert!(validate_cv_file("my.old.resume.doc", 1024).is_ok());
    }

    #[test]
    fn rejects_other_extensions() {
        assert!(validate_cv_file("resume.txt", 1024).is_err());
        assert!(validate_cv_file("resume.exe", 1024).is_err());
        assert!(validate_cv_file("resume", 1024).is_err());
    }

    #[test]
    fn rejects_oversized_and_empty_files() {
        assert!(validate_cv_file("resume.pdf", MAX_CV_SIZE_BYTES).is_ok());
        assert!(validate_cv_file("resume.pdf", MAX_CV_SIZE_BYTES + 1).is_err());
        assert!(validate_cv_file("resume.pdf", 0).is_err());
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("user@example.com"));
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email("user@localhost"));
    }
}
