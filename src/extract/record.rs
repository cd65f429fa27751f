use serde::Deserialize;

/// Fallback value for a field the template expects but the document did not provide.
pub const PLACEHOLDER: &str = "-";

/// What a rule does with a field it never saw (or saw empty).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultPolicy {
    /// Leave it absent.
    Absent,
    /// Fill it with [`PLACEHOLDER`].
    #[default]
    Placeholder,
}

impl DefaultPolicy {
    pub fn resolve(self, value: Option<String>) -> Option<String> {
        match self {
            Self::Absent => value,
            Self::Placeholder => match value {
                Some(v) if !v.is_empty() => Some(v),
                _ => Some(PLACEHOLDER.to_string()),
            },
        }
    }
}

/// How a narrative record overrides a table-derived one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergePolicy {
    /// Anything but absent/empty wins, including [`PLACEHOLDER`]. Used for the index visit.
    PlaceholderOverwrites,
    /// [`PLACEHOLDER`] never replaces an existing value. Used for follow-up visits.
    PlaceholderPreserves,
}

impl MergePolicy {
    fn accepts(self, value: &str) -> bool {
        match self {
            Self::PlaceholderOverwrites => !value.is_empty(),
            Self::PlaceholderPreserves => !value.is_empty() && value != PLACEHOLDER,
        }
    }
}

/// Ordered field name -> value mapping. `None` means declared but absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldRecord {
    fields: Vec<(String, Option<String>)>,
}

impl FieldRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == name)
    }

    /// Value of `name`; `None` when absent or undeclared.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Sets `name`, replacing it in place if declared, appending otherwise.
    pub fn set(&mut self, name: &str, value: Option<String>) {
        match self.fields.iter_mut().find(|(k, _)| k == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Column-wise join: every field of `other` is set on `self`.
    pub fn assign(&mut self, other: FieldRecord) {
        for (k, v) in other.fields {
            self.set(&k, v);
        }
    }

    /// Appends the fields of `other` whose names are not declared yet.
    pub fn extend_missing(&mut self, other: &FieldRecord) {
        for (k, v) in &other.fields {
            if !self.contains(k) {
                self.fields.push((k.clone(), v.clone()));
            }
        }
    }

    /// Writes the present values of `newer` over `self` as `policy` allows.
    pub fn overlay(&mut self, newer: &FieldRecord, policy: MergePolicy) {
        for (k, v) in &newer.fields {
            if let Some(v) = v.as_deref().filter(|v| policy.accepts(v)) {
                self.set(k, Some(v.to_string()));
            }
        }
    }

    /// True when no field holds a non-empty value.
    pub fn is_blank(&self) -> bool {
        self.fields
            .iter()
            .all(|(_, v)| v.as_deref().map_or(true, str::is_empty))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, Option<V>)> for FieldRecord {
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        let mut record = FieldRecord::new();
        for (k, v) in iter {
            record.set(&k.into(), v.map(Into::into));
        }
        record
    }
}

/// Declares a typed field group: one `Option<String>` per known source key, a lookup
/// from source key to field, and conversion into an ordered [`FieldRecord`] whose names
/// are the output names (`key => "output"`, or the key itself).
macro_rules! field_group {
    (@column $key:literal) => {
        $key
    };
    (@column $key:literal $column:literal) => {
        $column
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $field:ident : $key:literal $(=> $column:literal)? ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq)]
        $vis struct $name {
            $( pub $field: Option<String>, )+
        }

        impl $name {
            pub fn slot_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
                match key {
                    $( $key => Some(&mut self.$field), )+
                    _ => None,
                }
            }

            pub fn into_record(
                self,
                defaults: $crate::extract::record::DefaultPolicy,
            ) -> $crate::extract::record::FieldRecord {
                let mut record = $crate::extract::record::FieldRecord::new();
                $(
                    record.set(
                        field_group!(@column $key $($column)?),
                        defaults.resolve(self.$field),
                    );
                )+
                record
            }
        }
    };
}

pub(crate) use field_group;
