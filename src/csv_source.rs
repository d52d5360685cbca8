//! Reader for the registry's bulk-download CSV files.
//!
//! Files are headerless UTF-8 with 24 positional columns. Each row is
//! checked against the record shape before it is handed to ingestion; a row
//! that fails yields [`Error::Validation`] carrying its line number.

use std::{fs::File, io::Read, path::Path};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    error::{Error, Result},
    record::{self, Address, Country, Kind, ProcessKind, Record},
};

/// One raw CSV row, in column order.
#[derive(Debug, Deserialize)]
struct Row {
    sequence_number: String,
    id: String,
    process: String,
    correction: String,
    kind: String,
    country: String,
    latest: String,
    registration_date: String,
    update_date: String,
    disposal_date: String,
    expire_date: String,
    address: String,
    address_prefecture_code: String,
    address_city_code: String,
    address_request: String,
    address_request_prefecture_code: String,
    address_request_city_code: String,
    kana: String,
    name: String,
    address_inside: String,
    address_inside_prefecture_code: String,
    address_inside_city_code: String,
    trade_name: String,
    popular_or_previous_name: String,
}

/// Iterator over validated records from a CSV source.
pub struct CsvRecords<R> {
    reader: csv::Reader<R>,
    row: csv::StringRecord,
}

impl CsvRecords<File> {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_reader(File::open(path)?))
    }
}

impl<R: Read> CsvRecords<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader: csv::ReaderBuilder::new()
                .has_headers(false)
                .from_reader(reader),
            row: csv::StringRecord::new(),
        }
    }
}

impl<R: Read> Iterator for CsvRecords<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record(&mut self.row) {
            Ok(false) => None,
            Ok(true) => {
                let line = self.row.position().map_or(0, |p| p.line());
                Some(
                    self.row
                        .deserialize::<Row>(None)
                        .map_err(Error::from)
                        .and_then(|row| row.into_record(line)),
                )
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}

impl Row {
    fn into_record(self, line: u64) -> Result<Record> {
        let v = Validator { line };
        Ok(Record {
            sequence_number: v.text(
                "sequenceNumber",
                self.sequence_number,
                1,
                8,
            )?,
            id: v.id(self.id)?,
            process: v.code("process", &self.process, ProcessKind::from_code)?,
            correction: v.correction(&self.correction)?,
            kind: v.code("kind", &self.kind, Kind::from_code)?,
            country: v.code("country", &self.country, Country::from_code)?,
            is_latest: v.latest(&self.latest)?,
            registration_date: v.date(
                "registrationDate",
                &self.registration_date,
            )?,
            update_date: v.optional_date("updateDate", &self.update_date)?,
            disposal_date: v
                .optional_date("disposalDate", &self.disposal_date)?,
            expire_date: v.optional_date("expireDate", &self.expire_date)?,
            address: v.address(
                "address",
                self.address,
                600,
                self.address_prefecture_code,
                self.address_city_code,
            )?,
            address_request: v.address(
                "addressRequest",
                self.address_request,
                600,
                self.address_request_prefecture_code,
                self.address_request_city_code,
            )?,
            address_inside: v.address(
                "addressInside",
                self.address_inside,
                300,
                self.address_inside_prefecture_code,
                self.address_inside_city_code,
            )?,
            kana: v.text("kana", self.kana, 0, 500)?,
            name: v.text("name", self.name, 0, 300)?,
            trade_name: v.text("tradeName", self.trade_name, 0, 200)?,
            popular_or_previous_name: v.text(
                "popularOrPreviousName",
                self.popular_or_previous_name,
                0,
                200,
            )?,
        })
    }
}

struct Validator {
    line: u64,
}

impl Validator {
    fn fail(&self, field: &'static str, reason: impl Into<String>) -> Error {
        Error::Validation {
            line: self.line,
            field,
            reason: reason.into(),
        }
    }

    fn text(
        &self,
        field: &'static str,
        value: String,
        min: usize,
        max: usize,
    ) -> Result<String> {
        let len = value.chars().count();
        if len < min || len > max {
            return Err(self.fail(
                field,
                format!("length {len} outside {min}..={max}"),
            ));
        }
        Ok(value)
    }

    fn id(&self, value: String) -> Result<String> {
        if !record::is_valid_id(&value) {
            return Err(self.fail(
                "id",
                format!(
                    "expected {} characters starting with '{}', got {value:?}",
                    record::ID_LEN,
                    record::ID_PREFIX
                ),
            ));
        }
        Ok(value)
    }

    fn code<T>(
        &self,
        field: &'static str,
        value: &str,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> Result<T> {
        parse(value).ok_or_else(|| {
            self.fail(field, format!("unknown code {value:?}"))
        })
    }

    fn correction(&self, value: &str) -> Result<Option<bool>> {
        match value {
            "1" => Ok(Some(true)),
            "0" => Ok(Some(false)),
            "" => Ok(None),
            other => Err(self.fail(
                "correction",
                format!("unknown code {other:?}"),
            )),
        }
    }

    fn latest(&self, value: &str) -> Result<bool> {
        match value {
            "1" => Ok(true),
            "0" => Ok(false),
            other => {
                Err(self.fail("latest", format!("unknown code {other:?}")))
            }
        }
    }

    fn date(&self, field: &'static str, value: &str) -> Result<NaiveDate> {
        if value.len() != 10 {
            return Err(self.fail(field, format!("not a YYYY-MM-DD date: {value:?}")));
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|e| self.fail(field, format!("{value:?}: {e}")))
    }

    fn optional_date(
        &self,
        field: &'static str,
        value: &str,
    ) -> Result<Option<NaiveDate>> {
        if value.is_empty() {
            return Ok(None);
        }
        self.date(field, value).map(Some)
    }

    fn fixed_code(
        &self,
        field: &'static str,
        value: String,
        len: usize,
    ) -> Result<Option<String>> {
        if value.is_empty() {
            return Ok(None);
        }
        if value.chars().count() != len {
            return Err(self.fail(
                field,
                format!("expected {len} characters, got {value:?}"),
            ));
        }
        Ok(Some(value))
    }

    fn address(
        &self,
        field: &'static str,
        text: String,
        max: usize,
        prefecture_code: String,
        city_code: String,
    ) -> Result<Address> {
        Ok(Address {
            text: self.text(field, text, 0, max)?,
            prefecture_code: self.fixed_code(field, prefecture_code, 2)?,
            city_code: self.fixed_code(field, city_code, 3)?,
        })
    }
}
