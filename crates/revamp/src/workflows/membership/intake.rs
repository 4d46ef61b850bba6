//! Form-level validation applied before a registration or ambassador
//! application becomes a pending record.

use mime::Mime;

use super::domain::{ApplicationAnswers, MediaUpload, RegistrationRequest, UserId};

pub const MIN_NAME_CHARS: usize = 2;
pub const MIN_COLLEGE_CHARS: usize = 2;
pub const MIN_WHY_CHARS: usize = 100;
pub const MIN_WHAT_CHARS: usize = 100;
pub const MIN_EXPERIENCE_CHARS: usize = 50;
pub const MAX_VIDEO_BYTES: usize = 20 * 1024 * 1024;
pub const MAX_COLLEGE_ID_BYTES: usize = 10 * 1024 * 1024;
pub const ACCEPTED_VIDEO_TYPES: [&str; 3] = ["video/mp4", "video/webm", "video/quicktime"];

/// Field-level rejection of a submitted form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeViolation {
    #[error("name must be at least 2 characters")]
    NameTooShort,
    #[error("{field} is not a valid email address")]
    InvalidEmail { field: &'static str },
    #[error("college name must be at least 2 characters")]
    CollegeTooShort,
    #[error("year of study must be between 1 and 4, got {0}")]
    YearOutOfRange(u32),
    #[error("{field} needs at least {minimum} characters, got {actual}")]
    AnswerTooShort {
        field: &'static str,
        minimum: usize,
        actual: usize,
    },
    #[error("file is {actual} bytes, limit is {max_bytes}")]
    FileTooLarge { max_bytes: usize, actual: usize },
    #[error("file is empty")]
    EmptyFile,
    #[error("file name is missing")]
    MissingFileName,
    #[error("content type {content_type} is not accepted")]
    UnsupportedMediaType { content_type: String },
    #[error("event title must be at least 2 characters")]
    TitleTooShort,
    #[error("event must target at least one year of study")]
    NoTargetYears,
    #[error("event must name at least one college or domain")]
    NoAudience,
}

pub fn validate_registration(request: &RegistrationRequest) -> Result<(), IntakeViolation> {
    if request.name.trim().chars().count() < MIN_NAME_CHARS {
        return Err(IntakeViolation::NameTooShort);
    }
    if !is_plausible_email(&request.email) {
        return Err(IntakeViolation::InvalidEmail { field: "email" });
    }
    if request.college.trim().chars().count() < MIN_COLLEGE_CHARS {
        return Err(IntakeViolation::CollegeTooShort);
    }
    if !(1..=4).contains(&request.year) {
        return Err(IntakeViolation::YearOutOfRange(request.year));
    }
    if !is_plausible_email(&request.college_email) {
        return Err(IntakeViolation::InvalidEmail {
            field: "college email",
        });
    }
    Ok(())
}

pub fn validate_answers(answers: &ApplicationAnswers) -> Result<(), IntakeViolation> {
    for (field, value, minimum) in [
        ("why", &answers.why, MIN_WHY_CHARS),
        ("what", &answers.what, MIN_WHAT_CHARS),
        ("experience", &answers.experience, MIN_EXPERIENCE_CHARS),
    ] {
        let actual = value.chars().count();
        if actual < minimum {
            return Err(IntakeViolation::AnswerTooShort {
                field,
                minimum,
                actual,
            });
        }
    }
    Ok(())
}

pub fn validate_video(upload: &MediaUpload) -> Result<Mime, IntakeViolation> {
    let content_type = check_file(upload, MAX_VIDEO_BYTES)?;
    if ACCEPTED_VIDEO_TYPES.contains(&content_type.essence_str()) {
        Ok(content_type)
    } else {
        Err(IntakeViolation::UnsupportedMediaType {
            content_type: upload.content_type.clone(),
        })
    }
}

/// College ID proof: any image, or a PDF scan.
pub fn validate_college_id(upload: &MediaUpload) -> Result<Mime, IntakeViolation> {
    let content_type = check_file(upload, MAX_COLLEGE_ID_BYTES)?;
    if content_type.type_() == mime::IMAGE || content_type == mime::APPLICATION_PDF {
        Ok(content_type)
    } else {
        Err(IntakeViolation::UnsupportedMediaType {
            content_type: upload.content_type.clone(),
        })
    }
}

pub fn college_id_path(user_id: &UserId, upload: &MediaUpload) -> Result<String, IntakeViolation> {
    Ok(format!("college-ids/{}/{}", user_id, file_name(upload)?))
}

pub fn ambassador_video_path(
    user_id: &UserId,
    upload: &MediaUpload,
) -> Result<String, IntakeViolation> {
    Ok(format!("ambassador-videos/{}/{}", user_id, file_name(upload)?))
}

fn check_file(upload: &MediaUpload, max_bytes: usize) -> Result<Mime, IntakeViolation> {
    if upload.bytes.is_empty() {
        return Err(IntakeViolation::EmptyFile);
    }
    if upload.bytes.len() > max_bytes {
        return Err(IntakeViolation::FileTooLarge {
            max_bytes,
            actual: upload.bytes.len(),
        });
    }
    file_name(upload)?;
    upload
        .content_type
        .parse::<Mime>()
        .map_err(|_| IntakeViolation::UnsupportedMediaType {
            content_type: upload.content_type.clone(),
        })
}

// Only the final path component is kept so uploads cannot escape their folder.
fn file_name(upload: &MediaUpload) -> Result<&str, IntakeViolation> {
    let name = upload
        .file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        Err(IntakeViolation::MissingFileName)
    } else {
        Ok(name)
    }
}

fn is_plausible_email(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
