use std::cmp::Ordering;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Whitespace processing applied to a value before it is checked
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum WhiteSpace {
    Preserve,
    Replace,
    Collapse,
}

/// The built-in XML Schema datatypes that schemas may reference
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Builtin {
    AnySimpleType,
    String,
    NormalizedString,
    Token,
    Language,
    Name,
    NcName,
    NmToken,
    NmTokens,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    QName,
    AnyUri,
    Boolean,
    Decimal,
    Integer,
    NonPositiveInteger,
    NegativeInteger,
    NonNegativeInteger,
    PositiveInteger,
    Long,
    Int,
    Short,
    Byte,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    Float,
    Double,
    Duration,
    DateTime,
    Date,
    Time,
    GYear,
    GYearMonth,
    GMonth,
    GMonthDay,
    GDay,
    Base64Binary,
    HexBinary,
}

const TZ: &str = r"(Z|[+-](\d{2}):(\d{2}))?";

static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").unwrap());
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());
static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?|-?INF|\+INF|NaN)$").unwrap()
});
static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?P(\d+Y)?(\d+M)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$").unwrap()
});
static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^(-?\d{{4,}})-(\d{{2}})-(\d{{2}}){TZ}$")).unwrap());
static DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(-?\d{{4,}})-(\d{{2}})-(\d{{2}})T(\d{{2}}):(\d{{2}}):(\d{{2}})(\.\d+)?{TZ}$"
    ))
    .unwrap()
});
static TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(\d{{2}}):(\d{{2}}):(\d{{2}})(\.\d+)?{TZ}$")).unwrap()
});
static G_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"^-?\d{{4,}}{TZ}$")).unwrap());
static G_YEAR_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^-?\d{{4,}}-(\d{{2}}){TZ}$")).unwrap());
static G_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"^--(\d{{2}}){TZ}$")).unwrap());
static G_MONTH_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^--(\d{{2}})-(\d{{2}}){TZ}$")).unwrap());
static G_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"^---(\d{{2}}){TZ}$")).unwrap());
static LANGUAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$").unwrap());
static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{L}_:][\p{L}\p{N}\p{M}._:\-]*$").unwrap());
static NC_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{L}_][\p{L}\p{N}\p{M}._\-]*$").unwrap());
static NM_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{L}\p{N}\p{M}._:\-]+$").unwrap());
static BASE64: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/]*={0,2}$").unwrap());
static HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9a-fA-F]{2})*$").unwrap());

impl Builtin {
    /// Looks up a built-in type by its local name in the XML Schema namespace. `anyType` is not
    /// a simple type and is handled separately.
    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "anySimpleType" | "anyAtomicType" => Builtin::AnySimpleType,
            "string" => Builtin::String,
            "normalizedString" => Builtin::NormalizedString,
            "token" => Builtin::Token,
            "language" => Builtin::Language,
            "Name" => Builtin::Name,
            "NCName" => Builtin::NcName,
            "NMTOKEN" => Builtin::NmToken,
            "NMTOKENS" => Builtin::NmTokens,
            "ID" => Builtin::Id,
            "IDREF" => Builtin::IdRef,
            "IDREFS" => Builtin::IdRefs,
            "ENTITY" => Builtin::Entity,
            "ENTITIES" => Builtin::Entities,
            "QName" => Builtin::QName,
            "anyURI" => Builtin::AnyUri,
            "boolean" => Builtin::Boolean,
            "decimal" => Builtin::Decimal,
            "integer" => Builtin::Integer,
            "nonPositiveInteger" => Builtin::NonPositiveInteger,
            "negativeInteger" => Builtin::NegativeInteger,
            "nonNegativeInteger" => Builtin::NonNegativeInteger,
            "positiveInteger" => Builtin::PositiveInteger,
            "long" => Builtin::Long,
            "int" => Builtin::Int,
            "short" => Builtin::Short,
            "byte" => Builtin::Byte,
            "unsignedLong" => Builtin::UnsignedLong,
            "unsignedInt" => Builtin::UnsignedInt,
            "unsignedShort" => Builtin::UnsignedShort,
            "unsignedByte" => Builtin::UnsignedByte,
            "float" => Builtin::Float,
            "double" => Builtin::Double,
            "duration" => Builtin::Duration,
            "dateTime" => Builtin::DateTime,
            "date" => Builtin::Date,
            "time" => Builtin::Time,
            "gYear" => Builtin::GYear,
            "gYearMonth" => Builtin::GYearMonth,
            "gMonth" => Builtin::GMonth,
            "gMonthDay" => Builtin::GMonthDay,
            "gDay" => Builtin::GDay,
            "base64Binary" => Builtin::Base64Binary,
            "hexBinary" => Builtin::HexBinary,
            _ => return None,
        };
        Some(builtin)
    }

    /// The built-in type this one is derived from. `anySimpleType` is the root.
    pub fn base(&self) -> Option<Builtin> {
        let base = match self {
            Builtin::AnySimpleType => return None,
            Builtin::NormalizedString => Builtin::String,
            Builtin::Token => Builtin::NormalizedString,
            Builtin::Language | Builtin::Name | Builtin::NmToken => Builtin::Token,
            Builtin::NcName => Builtin::Name,
            Builtin::Id | Builtin::IdRef | Builtin::Entity => Builtin::NcName,
            Builtin::Integer => Builtin::Decimal,
            Builtin::NonPositiveInteger | Builtin::NonNegativeInteger | Builtin::Long => {
                Builtin::Integer
            }
            Builtin::NegativeInteger => Builtin::NonPositiveInteger,
            Builtin::Int => Builtin::Long,
            Builtin::Short => Builtin::Int,
            Builtin::Byte => Builtin::Short,
            Builtin::UnsignedLong | Builtin::PositiveInteger => Builtin::NonNegativeInteger,
            Builtin::UnsignedInt => Builtin::UnsignedLong,
            Builtin::UnsignedShort => Builtin::UnsignedInt,
            Builtin::UnsignedByte => Builtin::UnsignedShort,
            _ => Builtin::AnySimpleType,
        };
        Some(base)
    }

    pub fn white_space(&self) -> WhiteSpace {
        match self {
            Builtin::String | Builtin::AnySimpleType => WhiteSpace::Preserve,
            Builtin::NormalizedString => WhiteSpace::Replace,
            _ => WhiteSpace::Collapse,
        }
    }

    /// True for types whose values are ordered numerically
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Builtin::Decimal
                | Builtin::Integer
                | Builtin::NonPositiveInteger
                | Builtin::NegativeInteger
                | Builtin::NonNegativeInteger
                | Builtin::PositiveInteger
                | Builtin::Long
                | Builtin::Int
                | Builtin::Short
                | Builtin::Byte
                | Builtin::UnsignedLong
                | Builtin::UnsignedInt
                | Builtin::UnsignedShort
                | Builtin::UnsignedByte
                | Builtin::Float
                | Builtin::Double
        )
    }

    /// True for the date and time types, whose canonical values order lexically
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Builtin::DateTime
                | Builtin::Date
                | Builtin::Time
                | Builtin::GYear
                | Builtin::GYearMonth
                | Builtin::GMonth
                | Builtin::GMonthDay
                | Builtin::GDay
        )
    }

    /// The length of a value as measured by the length facets: octets for binary types and
    /// characters otherwise
    pub fn value_length(&self, value: &str) -> usize {
        match self {
            Builtin::HexBinary => value.len() / 2,
            Builtin::Base64Binary => {
                let chars: Vec<char> = value.chars().filter(|c| !c.is_whitespace()).collect();
                let padding = chars.iter().rev().take_while(|c| **c == '=').count();
                (chars.len() / 4 * 3).saturating_sub(padding.min(2))
            }
            Builtin::NmTokens | Builtin::IdRefs | Builtin::Entities => {
                value.split_whitespace().count()
            }
            _ => value.chars().count(),
        }
    }

    /// Checks that an already whitespace-normalized value is in the type's lexical space
    pub fn check(&self, value: &str) -> Result<(), String> {
        let valid = match self {
            Builtin::AnySimpleType | Builtin::String | Builtin::AnyUri => true,
            Builtin::NormalizedString => !value.contains(['\r', '\n', '\t']),
            Builtin::Token => {
                !value.contains(['\r', '\n', '\t'])
                    && !value.starts_with(' ')
                    && !value.ends_with(' ')
                    && !value.contains("  ")
            }
            Builtin::Language => LANGUAGE.is_match(value),
            Builtin::Name => NAME.is_match(value),
            Builtin::NcName | Builtin::Id | Builtin::IdRef | Builtin::Entity => {
                NC_NAME.is_match(value)
            }
            Builtin::NmToken => NM_TOKEN.is_match(value),
            Builtin::NmTokens => is_list_of(value, &NM_TOKEN),
            Builtin::IdRefs | Builtin::Entities => is_list_of(value, &NC_NAME),
            Builtin::QName => match value.split_once(':') {
                Some((prefix, local)) => NC_NAME.is_match(prefix) && NC_NAME.is_match(local),
                None => NC_NAME.is_match(value),
            },
            Builtin::Boolean => matches!(value, "true" | "false" | "1" | "0"),
            Builtin::Decimal => DECIMAL.is_match(value),
            Builtin::Float | Builtin::Double => FLOAT.is_match(value),
            Builtin::Integer
            | Builtin::NonPositiveInteger
            | Builtin::NegativeInteger
            | Builtin::NonNegativeInteger
            | Builtin::PositiveInteger
            | Builtin::Long
            | Builtin::Int
            | Builtin::Short
            | Builtin::Byte
            | Builtin::UnsignedLong
            | Builtin::UnsignedInt
            | Builtin::UnsignedShort
            | Builtin::UnsignedByte => return self.check_integer(value),
            Builtin::Duration => {
                DURATION.is_match(value)
                    && !value.ends_with('P')
                    && !value.ends_with('T')
            }
            Builtin::Date => DATE
                .captures(value)
                .map(|c| is_valid_date(&c[1], &c[2], &c[3]) && is_valid_tz(c.get(5), c.get(6)))
                .unwrap_or(false),
            Builtin::DateTime => DATE_TIME
                .captures(value)
                .map(|c| {
                    is_valid_date(&c[1], &c[2], &c[3])
                        && is_valid_time(&c[4], &c[5], &c[6], c.get(7).map(|m| m.as_str()))
                        && is_valid_tz(c.get(9), c.get(10))
                })
                .unwrap_or(false),
            Builtin::Time => TIME
                .captures(value)
                .map(|c| {
                    is_valid_time(&c[1], &c[2], &c[3], c.get(4).map(|m| m.as_str()))
                        && is_valid_tz(c.get(6), c.get(7))
                })
                .unwrap_or(false),
            Builtin::GYear => G_YEAR
                .captures(value)
                .map(|c| is_valid_tz(c.get(2), c.get(3)))
                .unwrap_or(false),
            Builtin::GYearMonth => G_YEAR_MONTH
                .captures(value)
                .map(|c| is_in_range(&c[1], 1, 12) && is_valid_tz(c.get(3), c.get(4)))
                .unwrap_or(false),
            Builtin::GMonth => G_MONTH
                .captures(value)
                .map(|c| is_in_range(&c[1], 1, 12) && is_valid_tz(c.get(3), c.get(4)))
                .unwrap_or(false),
            Builtin::GMonthDay => G_MONTH_DAY
                .captures(value)
                .map(|c| {
                    // 2000 is a leap year, so --02-29 is accepted
                    is_valid_date("2000", &c[1], &c[2]) && is_valid_tz(c.get(4), c.get(5))
                })
                .unwrap_or(false),
            Builtin::GDay => G_DAY
                .captures(value)
                .map(|c| is_in_range(&c[1], 1, 31) && is_valid_tz(c.get(3), c.get(4)))
                .unwrap_or(false),
            Builtin::Base64Binary => {
                let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
                compact.len() % 4 == 0 && BASE64.is_match(&compact)
            }
            Builtin::HexBinary => HEX.is_match(value),
        };

        if valid {
            Ok(())
        } else {
            Err(format!("'{}' is not a valid {}", value, self.name()))
        }
    }

    fn check_integer(&self, value: &str) -> Result<(), String> {
        if !INTEGER.is_match(value) {
            return Err(format!("'{}' is not a valid {}", value, self.name()));
        }

        let (min, max): (Option<i128>, Option<i128>) = match self {
            Builtin::NonPositiveInteger => (None, Some(0)),
            Builtin::NegativeInteger => (None, Some(-1)),
            Builtin::NonNegativeInteger => (Some(0), None),
            Builtin::PositiveInteger => (Some(1), None),
            Builtin::Long => (Some(i64::MIN.into()), Some(i64::MAX.into())),
            Builtin::Int => (Some(i32::MIN.into()), Some(i32::MAX.into())),
            Builtin::Short => (Some(i16::MIN.into()), Some(i16::MAX.into())),
            Builtin::Byte => (Some(i8::MIN.into()), Some(i8::MAX.into())),
            Builtin::UnsignedLong => (Some(0), Some(u64::MAX.into())),
            Builtin::UnsignedInt => (Some(0), Some(u32::MAX.into())),
            Builtin::UnsignedShort => (Some(0), Some(u16::MAX.into())),
            Builtin::UnsignedByte => (Some(0), Some(u8::MAX.into())),
            _ => (None, None),
        };

        if min.is_none() && max.is_none() {
            return Ok(());
        }

        let out_of_range = || format!("{} is out of range for {}", value, self.name());

        // Values too large for i128 are only acceptable for the unbounded side of a range
        let parsed = match value.trim_start_matches('+').parse::<i128>() {
            Ok(parsed) => parsed,
            Err(_) => {
                let negative = value.starts_with('-');
                return if (negative && min.is_none()) || (!negative && max.is_none()) {
                    Ok(())
                } else {
                    Err(out_of_range())
                };
            }
        };

        if min.map(|min| parsed < min).unwrap_or(false)
            || max.map(|max| parsed > max).unwrap_or(false)
        {
            Err(out_of_range())
        } else {
            Ok(())
        }
    }

    /// Orders two valid values of this type, for the range facets. Returns None for types
    /// without an order, or when either value is NaN.
    pub fn compare(&self, a: &str, b: &str) -> Option<Ordering> {
        match self {
            Builtin::Float | Builtin::Double => {
                let a = parse_float(a)?;
                let b = parse_float(b)?;
                a.partial_cmp(&b)
            }
            _ if self.is_numeric() => Some(compare_decimals(a, b)),
            _ if self.is_temporal() => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::AnySimpleType => "anySimpleType",
            Builtin::String => "string",
            Builtin::NormalizedString => "normalizedString",
            Builtin::Token => "token",
            Builtin::Language => "language",
            Builtin::Name => "Name",
            Builtin::NcName => "NCName",
            Builtin::NmToken => "NMTOKEN",
            Builtin::NmTokens => "NMTOKENS",
            Builtin::Id => "ID",
            Builtin::IdRef => "IDREF",
            Builtin::IdRefs => "IDREFS",
            Builtin::Entity => "ENTITY",
            Builtin::Entities => "ENTITIES",
            Builtin::QName => "QName",
            Builtin::AnyUri => "anyURI",
            Builtin::Boolean => "boolean",
            Builtin::Decimal => "decimal",
            Builtin::Integer => "integer",
            Builtin::NonPositiveInteger => "nonPositiveInteger",
            Builtin::NegativeInteger => "negativeInteger",
            Builtin::NonNegativeInteger => "nonNegativeInteger",
            Builtin::PositiveInteger => "positiveInteger",
            Builtin::Long => "long",
            Builtin::Int => "int",
            Builtin::Short => "short",
            Builtin::Byte => "byte",
            Builtin::UnsignedLong => "unsignedLong",
            Builtin::UnsignedInt => "unsignedInt",
            Builtin::UnsignedShort => "unsignedShort",
            Builtin::UnsignedByte => "unsignedByte",
            Builtin::Float => "float",
            Builtin::Double => "double",
            Builtin::Duration => "duration",
            Builtin::DateTime => "dateTime",
            Builtin::Date => "date",
            Builtin::Time => "time",
            Builtin::GYear => "gYear",
            Builtin::GYearMonth => "gYearMonth",
            Builtin::GMonth => "gMonth",
            Builtin::GMonthDay => "gMonthDay",
            Builtin::GDay => "gDay",
            Builtin::Base64Binary => "base64Binary",
            Builtin::HexBinary => "hexBinary",
        }
    }
}

/// Applies whitespace processing to a value
pub fn normalize(value: &str, white_space: WhiteSpace) -> String {
    match white_space {
        WhiteSpace::Preserve => value.to_string(),
        WhiteSpace::Replace => value.replace(['\t', '\n', '\r'], " "),
        WhiteSpace::Collapse => value.split_whitespace().collect::<Vec<&str>>().join(" "),
    }
}

fn is_list_of(value: &str, item: &Regex) -> bool {
    let mut items = value.split(' ').peekable();
    items.peek().is_some() && items.all(|i| item.is_match(i))
}

fn is_in_range(value: &str, min: u32, max: u32) -> bool {
    value
        .parse::<u32>()
        .map(|v| v >= min && v <= max)
        .unwrap_or(false)
}

fn is_valid_date(year: &str, month: &str, day: &str) -> bool {
    match (year.parse::<i32>(), month.parse::<u32>(), day.parse::<u32>()) {
        (Ok(year), Ok(month), Ok(day)) => NaiveDate::from_ymd_opt(year, month, day).is_some(),
        // years beyond i32 only need a plausible month and day
        (Err(_), Ok(month), Ok(day)) => (1..=12).contains(&month) && (1..=31).contains(&day),
        _ => false,
    }
}

fn is_valid_time(hour: &str, minute: &str, second: &str, fraction: Option<&str>) -> bool {
    let end_of_day = hour == "24"
        && minute == "00"
        && second == "00"
        && fraction.map(|f| f.trim_matches(['.', '0']).is_empty()).unwrap_or(true);
    end_of_day
        || (is_in_range(hour, 0, 23) && is_in_range(minute, 0, 59) && is_in_range(second, 0, 59))
}

fn is_valid_tz(hours: Option<regex::Match>, minutes: Option<regex::Match>) -> bool {
    match (hours, minutes) {
        (Some(hours), Some(minutes)) => {
            let hours = hours.as_str();
            let minutes = minutes.as_str();
            (is_in_range(hours, 0, 13) && is_in_range(minutes, 0, 59))
                || (hours == "14" && minutes == "00")
        }
        _ => true,
    }
}

fn parse_float(value: &str) -> Option<f64> {
    match value {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => None,
        _ => value.parse().ok(),
    }
}

/// Compares two lexically valid decimals of arbitrary size
fn compare_decimals(a: &str, b: &str) -> Ordering {
    let (a_negative, a_int, a_frac) = split_decimal(a);
    let (b_negative, b_int, b_frac) = split_decimal(b);

    let a_zero = a_int.is_empty() && a_frac.is_empty();
    let b_zero = b_int.is_empty() && b_frac.is_empty();
    let a_negative = a_negative && !a_zero;
    let b_negative = b_negative && !b_zero;

    if a_negative != b_negative {
        return if a_negative {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }

    let magnitude = a_int
        .len()
        .cmp(&b_int.len())
        .then_with(|| a_int.cmp(b_int))
        .then_with(|| {
            let width = a_frac.len().max(b_frac.len());
            format!("{:0<width$}", a_frac).cmp(&format!("{:0<width$}", b_frac))
        });

    if a_negative {
        magnitude.reverse()
    } else {
        magnitude
    }
}

/// Splits a decimal into its sign and its integer and fraction digits, without insignificant zeros
fn split_decimal(value: &str) -> (bool, &str, &str) {
    let negative = value.starts_with('-');
    let unsigned = value.trim_start_matches(['+', '-']);
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    (
        negative,
        int.trim_start_matches('0'),
        frac.trim_end_matches('0'),
    )
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use crate::xsd::builtin::{normalize, Builtin, WhiteSpace};

    fn valid(builtin: Builtin, value: &str) -> bool {
        builtin.check(value).is_ok()
    }

    #[test]
    fn builtin_derivation() {
        assert_eq!(Some(Builtin::Long), Builtin::Int.base());
        assert_eq!(Some(Builtin::NcName), Builtin::Id.base());
        assert_eq!(Some(Builtin::AnySimpleType), Builtin::String.base());
        assert_eq!(Some(Builtin::AnySimpleType), Builtin::NmTokens.base());
        assert_eq!(None, Builtin::AnySimpleType.base());
    }

    #[test]
    fn numeric_types() {
        assert!(valid(Builtin::Decimal, "-12.50"));
        assert!(valid(Builtin::Decimal, ".5"));
        assert!(!valid(Builtin::Decimal, "1e3"));
        assert!(valid(Builtin::Double, "1.5E-3"));
        assert!(valid(Builtin::Float, "-INF"));
        assert!(valid(Builtin::Integer, "+123456789012345678901234567890123456789012"));
        assert!(valid(Builtin::PositiveInteger, "1"));
        assert!(!valid(Builtin::PositiveInteger, "0"));
        assert!(valid(Builtin::NonNegativeInteger, "-0"));
        assert!(!valid(Builtin::NonNegativeInteger, "-1"));
        assert!(valid(Builtin::Int, "2147483647"));
        assert!(!valid(Builtin::Int, "2147483648"));
        assert!(!valid(Builtin::UnsignedByte, "256"));
        assert!(!valid(Builtin::Long, "99999999999999999999999999999999999999999999"));
        assert!(!valid(Builtin::Int, "1.0"));
    }

    #[test]
    fn temporal_types() {
        assert!(valid(Builtin::Date, "2024-02-29"));
        assert!(!valid(Builtin::Date, "2023-02-29"));
        assert!(valid(Builtin::Date, "2023-01-31+01:00"));
        assert!(!valid(Builtin::Date, "2023-1-31"));
        assert!(valid(Builtin::DateTime, "2023-01-31T23:59:59.123Z"));
        assert!(valid(Builtin::DateTime, "2023-01-31T24:00:00"));
        assert!(!valid(Builtin::DateTime, "2023-01-31T24:00:01"));
        assert!(!valid(Builtin::DateTime, "2023-01-31"));
        assert!(valid(Builtin::Time, "13:20:00-05:00"));
        assert!(!valid(Builtin::Time, "13:20:00+15:00"));
        assert!(valid(Builtin::GYear, "1999"));
        assert!(valid(Builtin::GYearMonth, "1999-12"));
        assert!(!valid(Builtin::GYearMonth, "1999-13"));
        assert!(valid(Builtin::GMonthDay, "--02-29"));
        assert!(valid(Builtin::Duration, "P1Y2M3DT10H30M"));
        assert!(valid(Builtin::Duration, "-PT0.5S"));
        assert!(!valid(Builtin::Duration, "P"));
        assert!(!valid(Builtin::Duration, "P1YT"));
    }

    #[test]
    fn name_and_token_types() {
        assert!(valid(Builtin::NcName, "_id-1.a"));
        assert!(!valid(Builtin::NcName, "a:b"));
        assert!(!valid(Builtin::NcName, "1abc"));
        assert!(valid(Builtin::QName, "xs:string"));
        assert!(valid(Builtin::Language, "de-CH"));
        assert!(valid(Builtin::NmTokens, "a b c"));
        assert!(!valid(Builtin::NmTokens, ""));
        assert!(valid(Builtin::Token, "a b"));
        assert!(!valid(Builtin::Token, " a"));
        assert!(valid(Builtin::Boolean, "1"));
        assert!(!valid(Builtin::Boolean, "yes"));
    }

    #[test]
    fn binary_types() {
        assert!(valid(Builtin::HexBinary, "0fB7"));
        assert!(!valid(Builtin::HexBinary, "0fB"));
        assert!(valid(Builtin::Base64Binary, "aGVsbG8="));
        assert!(!valid(Builtin::Base64Binary, "aGVsbG8"));
        assert_eq!(5, Builtin::Base64Binary.value_length("aGVsbG8="));
        assert_eq!(2, Builtin::HexBinary.value_length("0fB7"));
    }

    #[test]
    fn whitespace_processing() {
        assert_eq!(" a\tb ", normalize(" a\tb ", WhiteSpace::Preserve));
        assert_eq!(" a b ", normalize(" a\tb ", WhiteSpace::Replace));
        assert_eq!("a b", normalize(" a\t\n b ", WhiteSpace::Collapse));
        assert_eq!(Some(Builtin::NcName), Builtin::from_name("NCName"));
        assert_eq!(None, Builtin::from_name("anyType"));
    }

    #[test]
    fn order_values_for_range_checks() {
        assert_eq!(Some(Ordering::Less), Builtin::Decimal.compare("-1.5", "0"));
        assert_eq!(Some(Ordering::Equal), Builtin::Decimal.compare("01.50", "1.5"));
        assert_eq!(Some(Ordering::Equal), Builtin::Integer.compare("-0", "+0"));
        assert_eq!(Some(Ordering::Greater), Builtin::Decimal.compare("10", "9.99"));
        assert_eq!(Some(Ordering::Less), Builtin::Decimal.compare("-10", "-9.99"));
        assert_eq!(
            Some(Ordering::Greater),
            Builtin::Integer.compare("123456789012345678901234567890123456789012", "1")
        );
        assert_eq!(Some(Ordering::Less), Builtin::Double.compare("1E2", "INF"));
        assert_eq!(None, Builtin::Double.compare("NaN", "1"));
        assert_eq!(Some(Ordering::Less), Builtin::Date.compare("1999-12-31", "2000-01-01"));
        assert_eq!(None, Builtin::String.compare("a", "b"));
    }
}
