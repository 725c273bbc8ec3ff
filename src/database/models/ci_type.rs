pub const TABLE: &str = "CiTypes";

pub const TYPE_NAME: &str = "TypeName";
pub const SORT_ORDER: &str = "SortOrder";
pub const IS_ACTIVE: &str = "IsActive";
