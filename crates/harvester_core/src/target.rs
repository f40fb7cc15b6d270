/// What a single operation collects for a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// A timeline of records grown by repeated advance actions.
    Paginated,
    /// One snapshot record (the subject's profile).
    SingleRecord,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Paginated => "timeline",
            Mode::SingleRecord => "profile",
        }
    }
}

/// Immutable description of one operation for one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTarget {
    subject_id: String,
    mode: Mode,
    desired_count: usize,
}

impl CollectionTarget {
    pub fn paginated(subject_id: impl Into<String>, desired_count: usize) -> Self {
        Self {
            subject_id: subject_id.into(),
            mode: Mode::Paginated,
            desired_count,
        }
    }

    pub fn single_record(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            mode: Mode::SingleRecord,
            desired_count: 1,
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Upper bound on accepted records; always 1 for [`Mode::SingleRecord`].
    pub fn desired_count(&self) -> usize {
        match self.mode {
            Mode::Paginated => self.desired_count,
            Mode::SingleRecord => 1,
        }
    }
}

/// Parses a line-oriented subject list, trimming lines and dropping blanks.
pub fn parse_subject_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Handle used in URLs and directory names: the listed id without leading `@`s.
pub fn subject_handle(subject_id: &str) -> &str {
    subject_id.trim().trim_start_matches('@')
}

/// Whether `handle` names exactly one directory entry: non-empty, not `.` or
/// `..`, and free of path separators.
pub fn is_valid_handle(handle: &str) -> bool {
    !handle.is_empty() && handle != "." && handle != ".." && !handle.contains(['/', '\\'])
}
