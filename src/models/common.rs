/// Number of delivery weeks one order spans.
pub const WEEKS_PER_ORDER: i32 = 4;

pub type Week = i32;

#[derive(Clone, Copy, Debug, Default, Display, Eq, From, FromStr, Hash, Into, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct OrderId(pub i32);

#[derive(Clone, Copy, Debug, Default, Display, Eq, From, FromStr, Hash, Into, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct CustomerId(pub i32);

#[derive(Clone, Copy, Debug, Default, Display, Eq, From, FromStr, Hash, Into, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct MappingId(pub i32);

#[derive(Clone, Copy, Debug, Default, Display, Eq, From, FromStr, Hash, Into, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct RecipeId(pub i32);

#[derive(Clone, Copy, Debug, Default, Display, Eq, From, FromStr, Hash, Into, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct CategoryId(pub i32);

#[derive(Clone, Copy, Debug, Default, Display, Eq, From, FromStr, Hash, Into, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SpiceLevelId(pub i32);

#[derive(Clone, Copy, Debug, Default, Display, Eq, From, FromStr, Hash, Into, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SnackId(pub i32);

#[derive(Clone, Copy, Debug, Default, Display, Eq, From, FromStr, Hash, Into, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct SnackMappingId(pub i32);

/// Payment intent id issued by the payment provider.
#[derive(Clone, Debug, Default, Display, Eq, From, Hash, PartialEq, Serialize, Deserialize)]
pub struct PaymentId(pub String);

#[derive(Clone, Debug, Default, Display, Eq, From, Hash, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionId(pub String);

/// Medium spice, assigned to every freshly allocated recipe.
pub const DEFAULT_SPICE_LEVEL: SpiceLevelId = SpiceLevelId(2);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

pub fn is_valid_week(week: Week) -> bool {
    week >= 1 && week <= WEEKS_PER_ORDER
}
