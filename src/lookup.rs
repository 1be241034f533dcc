//! Value-help filters built from a selection bar.
use super::error::LookupError;
use chrono::NaiveDate;

const DATE_FORMAT: &str = "%d.%m.%Y";
const DATE_LENGTH: usize = 10;

/// A selection field, classified once by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupField {
    DocDate,
    CreatDate,
    Text(String),
}

impl LookupField {
    pub fn classify(name: &str) -> Self {
        match name {
            "DocDate" => LookupField::DocDate,
            "CreatDate" => LookupField::CreatDate,
            other => LookupField::Text(other.to_string()),
        }
    }
    pub fn path(&self) -> &str {
        match self {
            LookupField::DocDate => "DocDate",
            LookupField::CreatDate => "CreatDate",
            LookupField::Text(name) => name,
        }
    }
    pub fn is_date_range(&self) -> bool {
        matches!(self, LookupField::DocDate | LookupField::CreatDate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFilter {
    Between {
        path: String,
        from: NaiveDate,
        to: NaiveDate,
    },
    Contains {
        path: String,
        value: String,
    },
}

/// Builds one filter per non-empty selection value. The filters are meant to
/// be combined with a logical and.
pub fn build_filters<'a, I>(selection: I) -> Result<Vec<LookupFilter>, LookupError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut filters = vec![];
    for (name, value) in selection {
        if value.is_empty() {
            continue;
        }
        let field = LookupField::classify(name);
        let filter = if field.is_date_range() {
            let (from, to) = parse_date_range(value)?;
            LookupFilter::Between {
                path: field.path().to_string(),
                from,
                to,
            }
        } else {
            LookupFilter::Contains {
                path: field.path().to_string(),
                value: value.to_string(),
            }
        };
        filters.push(filter);
    }

    if filters.is_empty() {
        return Err(LookupError::NoParameter);
    }
    Ok(filters)
}

/// `dd.MM.yyyy - dd.MM.yyyy`: the first and last ten characters. A single
/// date gives a one-day range.
pub fn parse_date_range(value: &str) -> Result<(NaiveDate, NaiveDate), LookupError> {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < DATE_LENGTH {
        return Err(LookupError::InvalidDate(value.to_string()));
    }
    let first: String = chars[..DATE_LENGTH].iter().collect();
    let last: String = chars[chars.len() - DATE_LENGTH..].iter().collect();

    Ok((parse_date(&first)?, parse_date(&last)?))
}

fn parse_date(text: &str) -> Result<NaiveDate, LookupError> {
    if !is_valid_date(text) {
        return Err(LookupError::InvalidDate(text.to_string()));
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|_| LookupError::InvalidDate(text.to_string()))
}

/// Strict `dd.MM.yyyy` calendar date.
pub fn is_valid_date(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() != DATE_LENGTH || bytes[2] != b'.' || bytes[5] != b'.' {
        return false;
    }
    let digits = [0, 1, 3, 4, 6, 7, 8, 9];
    if !digits.iter().all(|&i| bytes[i].is_ascii_digit()) {
        return false;
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT).is_ok()
}
