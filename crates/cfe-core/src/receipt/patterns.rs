//! Regex patterns for CFE receipt text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Identifiers
    pub static ref SERVICE_NUMBER: Regex = Regex::new(
        r"(?i)(?:no\.?|n[uú]m(?:ero)?\.?)\s*(?:de\s+)?servicio\s*:?\s*(\d{12})"
    ).unwrap();

    pub static ref ACCOUNT_NUMBER: Regex = Regex::new(
        r"(?i:cuenta)\s*:?\s*([0-9][0-9A-Z\-]{7,24})"
    ).unwrap();

    pub static ref METER_NUMBER: Regex = Regex::new(
        r"(?i:medidor)\s*:?\s*([0-9][0-9A-Z]{3,14}|[A-Z]{1,3}[0-9][0-9A-Z]{2,13})\b"
    ).unwrap();

    // Client
    pub static ref CLIENT_NAME: Regex = Regex::new(
        r"(?im)^[ \t]*(?:nombre|titular|cliente)[ \t]*:?[ \t]*(\p{L}[^\n]*?)[ \t\r]*$"
    ).unwrap();

    pub static ref ADDRESS: Regex = Regex::new(
        r"(?im)^[ \t]*(?:direcci[oó]n|domicilio)[ \t]*:?[ \t]*([^\s:][^\n]*?)[ \t\r]*$"
    ).unwrap();

    // Readings and consumption. Amounts accept either decimal convention
    // ("1,250.50" or "1.250,50"); parse_locale_number resolves which.
    pub static ref CURRENT_CONSUMPTION: Regex = Regex::new(
        r"(?i)(?:lectura|consumo)\s+actual\s*:?\s*(\d(?:[\d.,]*\d)?)"
    ).unwrap();

    pub static ref PREVIOUS_CONSUMPTION: Regex = Regex::new(
        r"(?i)(?:lectura|consumo)\s+anterior\s*:?\s*(\d(?:[\d.,]*\d)?)"
    ).unwrap();

    pub static ref CONSUMPTION_KWH: Regex = Regex::new(
        r"(?i)consumo[^\n\d]{0,30}?(\d(?:[\d.,]*\d)?)\s*kwh"
    ).unwrap();

    // Billing
    pub static ref CURRENT_AMOUNT: Regex = Regex::new(
        r"(?i)(?:total\s+a\s+pagar|importe\s+total|monto\s+a\s+pagar)\s*:?\s*\$?\s*(\d(?:[\d.,]*\d)?)"
    ).unwrap();

    pub static ref TARIFF_TYPE: Regex = Regex::new(
        r"(?i)tarifa\s*:?\s*(1[a-f]?|dac|pdbt|gdbt|gdmto|gdmth|rabt|apbt|apmt)\b"
    ).unwrap();

    // Dates: "15/01/2024", "15-01-24", "15 ENE 2024"
    pub static ref ISSUE_DATE: Regex = Regex::new(
        r"(?i)(?:fecha\s+de\s+(?:emisi[oó]n|facturaci[oó]n)|emitido(?:\s+el)?)\s*:?\s*(\d{1,2}[/\-. ](?:\d{1,2}|[a-z]{3})[/\-. ]\d{2,4})"
    ).unwrap();

    pub static ref DUE_DATE: Regex = Regex::new(
        r"(?i)(?:fecha\s+l[ií]mite(?:\s+de\s+pago)?|l[ií]mite\s+de\s+pago|pagar\s+antes\s+de|vencimiento)\s*:?\s*(\d{1,2}[/\-. ](?:\d{1,2}|[a-z]{3})[/\-. ]\d{2,4})"
    ).unwrap();

    // Structural markers used by the confidence scorer
    pub static ref SERVICE_LABEL: Regex = Regex::new(
        r"(?i)(?:no\.?|n[uú]m(?:ero)?\.?)\s*(?:de\s+)?servicio"
    ).unwrap();

    pub static ref KWH_MENTION: Regex = Regex::new(
        r"(?i)\d[\d,.]*\s*kwh"
    ).unwrap();

    pub static ref CURRENCY_AMOUNT: Regex = Regex::new(
        r"\$\s*\d[\d,]*(?:\.\d{2})?"
    ).unwrap();

    pub static ref ANY_DATE: Regex = Regex::new(
        r"(?i)\b\d{1,2}[/\-. ](?:\d{1,2}|ene|feb|mar|abr|may|jun|jul|ago|sep|oct|nov|dic)[/\-. ]\d{2,4}\b"
    ).unwrap();

    pub static ref TARIFF_TOKEN: Regex = Regex::new(
        r"(?i)\b(?:1[a-f]|dac|pdbt|gdbt|gdmto|gdmth)\b|tarifa\s*:?\s*1\b"
    ).unwrap();
}
