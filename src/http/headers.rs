use std::fmt;

/// 有序的请求头多值表，头名不区分大小写
///
/// 头名保留第一次添加时的写法，同名的每个取值按添加顺序保存。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<String>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加取值，保留已有的取值
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => self.entries[index].1.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// 替换该头名的全部取值
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => self.entries[index].1 = vec![value],
            None => self.entries.push((name, vec![value])),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.position(name)
            .map(|index| self.entries.remove(index).1)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.position(name)
            .map(|index| self.entries[index].1.as_slice())
            .unwrap_or(&[])
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// 按 (头名, 取值) 遍历，每个取值一项
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }

    /// 按头名遍历全部取值
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Content-Type 的任一取值满足条件时返回 true
    pub fn content_type_matches(&self, predicate: impl Fn(&str) -> bool) -> bool {
        self.get_all("content-type")
            .iter()
            .any(|v| predicate(&v.to_ascii_lowercase()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

impl From<&reqwest::header::HeaderMap> for Headers {
    fn from(map: &reqwest::header::HeaderMap) -> Self {
        let mut headers = Headers::new();
        for (name, value) in map.iter() {
            headers.add(
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "application/json");

        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert!(headers.contains("Content-type"));
        assert_eq!(headers.get("Accept"), None);
    }

    #[test]
    fn test_add_accumulates_values() {
        let mut headers = Headers::new();
        headers.add("Accept", "text/plain");
        headers.add("accept", "application/json");
        headers.add("X-Other", "1");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get_all("ACCEPT"), ["text/plain", "application/json"]);
        assert_eq!(headers.iter().count(), 3);
    }

    #[test]
    fn test_set_replaces_values() {
        let mut headers = Headers::new();
        headers.add("Authorization", "a");
        headers.add("Authorization", "b");
        headers.set("authorization", "c");

        assert_eq!(headers.get_all("Authorization"), ["c"]);
    }

    #[test]
    fn test_remove() {
        let mut headers = Headers::new();
        headers.add("A", "1");
        assert_eq!(headers.remove("a"), Some(vec!["1".to_string()]));
        assert!(headers.is_empty());
        assert!(headers.get_all("A").is_empty());
    }

    #[test]
    fn test_content_type_matches() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "Application/JSON; charset=utf-8");
        assert!(headers.content_type_matches(|ct| ct.contains("json")));
        assert!(!headers.content_type_matches(|ct| ct.starts_with("text/")));
    }
}
