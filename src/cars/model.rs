use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppError,
    factory::Resource,
    store::{Collection, Document},
};

pub const NUMBER_REQUIRED: &str = "من فضلك ادخل رقم السيارة";
pub const LETTERS_REQUIRED: &str = "من فضلك ادخل حروف السيارة";
pub const GOVERNORATE_REQUIRED: &str = "من فضلك ادخل المحافظة";

/// A registered plate: number, letters and issuing governorate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    pub id: Uuid,
    pub number: String,
    pub letters: String,
    pub governorate: String,
}

impl Document for Car {
    const COLLECTION: Collection = Collection {
        name: "cars",
        unique: &[],
    };

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Default, Deserialize)]
struct CarFields {
    number: Option<String>,
    letters: Option<String>,
    governorate: Option<String>,
}

impl CarFields {
    fn from_body(body: Value) -> Result<Self, AppError> {
        let mut fields: CarFields =
            serde_json::from_value(body).map_err(|e| AppError::BadRequest(e.to_string()))?;
        fields.letters = fields.letters.map(|s| s.trim().to_string());
        fields.governorate = fields.governorate.map(|s| s.trim().to_string());
        Ok(fields)
    }

    /// With `partial`, absent fields are fine but present ones must be filled.
    fn check(&self, partial: bool) -> Result<(), AppError> {
        let rules = [
            (&self.number, NUMBER_REQUIRED),
            (&self.letters, LETTERS_REQUIRED),
            (&self.governorate, GOVERNORATE_REQUIRED),
        ];
        let errors: Vec<String> = rules
            .iter()
            .filter(|(value, _)| match value {
                Some(v) => v.is_empty(),
                None => !partial,
            })
            .map(|(_, msg)| msg.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

impl Resource for Car {
    const SINGULAR: &'static str = "car";
    const PLURAL: &'static str = "cars";
    type Public = Car;

    fn to_public(&self) -> Car {
        self.clone()
    }

    fn create(body: Value) -> Result<Self, AppError> {
        let fields = CarFields::from_body(body)?;
        fields.check(false)?;
        Ok(Car {
            id: Uuid::new_v4(),
            number: fields.number.unwrap_or_default(),
            letters: fields.letters.unwrap_or_default(),
            governorate: fields.governorate.unwrap_or_default(),
        })
    }

    fn apply_update(&mut self, body: Value) -> Result<(), AppError> {
        let fields = CarFields::from_body(body)?;
        fields.check(true)?;
        if let Some(number) = fields.number {
            self.number = number;
        }
        if let Some(letters) = fields.letters {
            self.letters = letters;
        }
        if let Some(governorate) = fields.governorate {
            self.governorate = governorate;
        }
        Ok(())
    }
}
