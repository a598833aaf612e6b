use chrono::{DateTime, NaiveDate, NaiveDateTime};

// ═══════════════════════════════════════════════════════════════
//  Buckets
// ═══════════════════════════════════════════════════════════════

/// Reserved subdirectory for per-user files.
pub const USER_DIR: &str = "by_user";

/// Fixed subdirectory an event type routes to. Closed set plus catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Cuisine,
    Dietary,
    RestaurantView,
    Bookmark,
    Search,
    Other,
}

impl Bucket {
    pub const ALL: [Bucket; 6] = [
        Bucket::Cuisine,
        Bucket::Dietary,
        Bucket::RestaurantView,
        Bucket::Bookmark,
        Bucket::Search,
        Bucket::Other,
    ];

    pub fn for_event_type(event_type: &str) -> Self {
        match event_type {
            "CUISINE_SELECTED" => Bucket::Cuisine,
            "DIETARY_PREFERENCE_SELECTED" => Bucket::Dietary,
            "RESTAURANT_VIEWED" => Bucket::RestaurantView,
            "RESTAURANT_BOOKMARKED" => Bucket::Bookmark,
            "SEARCH_PERFORMED" => Bucket::Search,
            _ => Bucket::Other,
        }
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            Bucket::Cuisine => "cuisine_events",
            Bucket::Dietary => "dietary_events",
            Bucket::RestaurantView => "restaurant_view_events",
            Bucket::Bookmark => "bookmark_events",
            Bucket::Search => "search_events",
            Bucket::Other => "other_events",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Targets
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Append,
    CreateOrOverwrite,
}

impl WriteMode {
    pub fn is_append(self) -> bool {
        self == WriteMode::Append
    }
}

/// Файл назначения для одной записи события.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFile {
    pub path: String,
    pub mode: WriteMode,
}

/// Type-scoped file (always) and user-scoped file (only with a user id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets {
    pub by_type: TargetFile,
    pub by_user: Option<TargetFile>,
}

impl Targets {
    pub fn iter(&self) -> impl Iterator<Item = &TargetFile> {
        std::iter::once(&self.by_type).chain(self.by_user.as_ref())
    }
}

// ═══════════════════════════════════════════════════════════════
//  PartitionResolver
// ═══════════════════════════════════════════════════════════════

/// Maps `(event type, date, user id)` to target paths under a base root.
///
/// Resolution is pure: the processing date is an argument, never read
/// from a clock here.
#[derive(Debug, Clone)]
pub struct PartitionResolver {
    base: String,
}

impl PartitionResolver {
    pub fn new(base: &str) -> Self {
        let trimmed = base.trim_end_matches('/');
        Self { base: trimmed.to_string() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// `<base>/<name>`
    pub fn dir(&self, name: &str) -> String {
        format!("{}/{name}", self.base)
    }

    pub fn resolve(
        &self,
        event_type: &str,
        timestamp: Option<&str>,
        user_id: Option<&str>,
        today: NaiveDate,
    ) -> Targets {
        let date = event_date(timestamp, today).format("%Y-%m-%d").to_string();
        let bucket = Bucket::for_event_type(event_type);

        let by_type = TargetFile {
            path: format!("{}/{bucket}/{date}.json", self.base),
            mode: WriteMode::Append,
        };

        let by_user = user_id.filter(|u| !u.is_empty()).map(|user| TargetFile {
            path: format!(
                "{}/{USER_DIR}/{user}/{}_{date}.json",
                self.base,
                file_component(event_type)
            ),
            mode: WriteMode::Append,
        });

        Targets { by_type, by_user }
    }
}

/// Event type as a file name component: path separators become `_`.
fn file_component(s: &str) -> String {
    s.replace(['/', '\\'], "_")
}

/// Date portion of an ISO-8601 timestamp, or `today` if absent or
/// unparseable. The date is taken as written, without converting the
/// offset to UTC.
pub fn event_date(timestamp: Option<&str>, today: NaiveDate) -> NaiveDate {
    timestamp.and_then(parse_date).unwrap_or(today)
}

fn parse_date(ts: &str) -> Option<NaiveDate> {
    let ts = ts.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(ts, fmt) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(ts, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn known_types_map_to_buckets() {
        assert_eq!(Bucket::for_event_type("CUISINE_SELECTED").dir_name(), "cuisine_events");
        assert_eq!(Bucket::for_event_type("DIETARY_PREFERENCE_SELECTED").dir_name(), "dietary_events");
        assert_eq!(Bucket::for_event_type("RESTAURANT_VIEWED").dir_name(), "restaurant_view_events");
        assert_eq!(Bucket::for_event_type("RESTAURANT_BOOKMARKED").dir_name(), "bookmark_events");
        assert_eq!(Bucket::for_event_type("SEARCH_PERFORMED").dir_name(), "search_events");
        assert_eq!(Bucket::for_event_type("restaurant_viewed"), Bucket::Other);
        assert_eq!(Bucket::for_event_type("FOO"), Bucket::Other);
    }

    #[test]
    fn resolves_both_targets() {
        let r = PartitionResolver::new("/user/savora/events/");
        let t = r.resolve("RESTAURANT_VIEWED", Some("2024-05-01T10:00:00"), Some("42"), today());
        assert_eq!(t.by_type.path, "/user/savora/events/restaurant_view_events/2024-05-01.json");
        assert_eq!(
            t.by_user.as_ref().map(|f| f.path.as_str()),
            Some("/user/savora/events/by_user/42/RESTAURANT_VIEWED_2024-05-01.json")
        );
        assert!(t.iter().all(|f| f.mode == WriteMode::Append));
        assert_eq!(t.iter().count(), 2);
    }

    #[test]
    fn empty_user_id_means_no_user_target() {
        let r = PartitionResolver::new("/e");
        assert!(r.resolve("SEARCH_PERFORMED", None, Some(""), today()).by_user.is_none());
        assert!(r.resolve("SEARCH_PERFORMED", None, None, today()).by_user.is_none());
    }

    #[test]
    fn resolution_is_deterministic() {
        let r = PartitionResolver::new("/e");
        let a = r.resolve("FOO", Some("garbage"), Some("7"), today());
        let b = r.resolve("FOO", Some("garbage"), Some("7"), today());
        assert_eq!(a, b);
        assert_eq!(a.by_type.path, "/e/other_events/2026-10-19.json");
    }

    #[test]
    fn timestamp_formats() {
        let d = |s| event_date(Some(s), today()).to_string();
        assert_eq!(d("2024-05-01T10:00:00.123Z"), "2024-05-01");
        assert_eq!(d("2024-05-01T23:30:00-05:00"), "2024-05-01");
        assert_eq!(d("2024-05-01T10:00:00.123456"), "2024-05-01");
        assert_eq!(d("2024-05-01 10:00:00"), "2024-05-01");
        assert_eq!(d("2024-05-01"), "2024-05-01");
        assert_eq!(d("05/01/2024"), "2026-10-19");
        assert_eq!(d("2024-13-45T00:00:00"), "2026-10-19");
        assert_eq!(event_date(None, today()).to_string(), "2026-10-19");
    }

    #[test]
    fn event_type_separators_do_not_nest_paths() {
        let r = PartitionResolver::new("/e");
        let t = r.resolve("../x", Some("2024-05-01"), Some("u"), today());
        assert_eq!(t.by_user.unwrap().path, "/e/by_user/u/.._x_2024-05-01.json");
    }
}
