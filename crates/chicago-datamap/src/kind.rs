//! Field kinds.

/// Kind of a field in a datamap, numbered as the game's `FIELD_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum FieldKind {
    Void = 0,
    Float,
    String,
    Vector,
    Quaternion,
    Integer,
    Boolean,
    Short,
    Character,
    Color32,
    Embedded,
    Custom,
    ClassPtr,
    EHandle,
    Edict,
    PositionVector,
    Time,
    Tick,
    ModelName,
    SoundName,
    Input,
    Function,
    VMatrix,
    VMatrixWorldspace,
    Matrix3x4Worldspace,
    Interval,
    ModelIndex,
    MaterialIndex,
    Vector2D,
}

impl FieldKind {
    /// Number of known kinds.
    pub const COUNT: u32 = 29;

    /// Parse from the raw on-disk value.
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Void,
            1 => Self::Float,
            2 => Self::String,
            3 => Self::Vector,
            4 => Self::Quaternion,
            5 => Self::Integer,
            6 => Self::Boolean,
            7 => Self::Short,
            8 => Self::Character,
            9 => Self::Color32,
            10 => Self::Embedded,
            11 => Self::Custom,
            12 => Self::ClassPtr,
            13 => Self::EHandle,
            14 => Self::Edict,
            15 => Self::PositionVector,
            16 => Self::Time,
            17 => Self::Tick,
            18 => Self::ModelName,
            19 => Self::SoundName,
            20 => Self::Input,
            21 => Self::Function,
            22 => Self::VMatrix,
            23 => Self::VMatrixWorldspace,
            24 => Self::Matrix3x4Worldspace,
            25 => Self::Interval,
            26 => Self::ModelIndex,
            27 => Self::MaterialIndex,
            28 => Self::Vector2D,
            _ => return None,
        })
    }

    /// Size of one element in a restored instance.
    ///
    /// String-family kinds occupy a 32-bit string handle. Embedded, custom and
    /// void have no intrinsic size.
    pub fn element_size(&self) -> usize {
        match self {
            Self::Void | Self::Embedded | Self::Custom => 0,
            Self::Boolean | Self::Character => 1,
            Self::Short => 2,
            Self::Float
            | Self::Integer
            | Self::Color32
            | Self::ClassPtr
            | Self::EHandle
            | Self::Edict
            | Self::Time
            | Self::Tick
            | Self::Input => 4,
            Self::String
            | Self::ModelName
            | Self::SoundName
            | Self::Function
            | Self::ModelIndex
            | Self::MaterialIndex => 4,
            Self::Interval | Self::Vector2D => 8,
            Self::Vector | Self::PositionVector => 12,
            Self::Quaternion => 16,
            Self::Matrix3x4Worldspace => 48,
            Self::VMatrix | Self::VMatrixWorldspace => 64,
        }
    }

    /// Kinds stored on disk as NUL-terminated strings.
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            Self::String
                | Self::ModelName
                | Self::SoundName
                | Self::Function
                | Self::ModelIndex
                | Self::MaterialIndex
        )
    }

    /// Kinds copied verbatim from the stream.
    pub fn is_fixed_binary(&self) -> bool {
        !self.is_string() && !matches!(self, Self::Void | Self::Embedded | Self::Custom)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Float => "float",
            Self::String => "string",
            Self::Vector => "vector",
            Self::Quaternion => "quaternion",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Short => "short",
            Self::Character => "character",
            Self::Color32 => "color32",
            Self::Embedded => "embedded",
            Self::Custom => "custom",
            Self::ClassPtr => "classptr",
            Self::EHandle => "ehandle",
            Self::Edict => "edict",
            Self::PositionVector => "position_vector",
            Self::Time => "time",
            Self::Tick => "tick",
            Self::ModelName => "modelname",
            Self::SoundName => "soundname",
            Self::Input => "input",
            Self::Function => "function",
            Self::VMatrix => "vmatrix",
            Self::VMatrixWorldspace => "vmatrix_worldspace",
            Self::Matrix3x4Worldspace => "matrix3x4_worldspace",
            Self::Interval => "interval",
            Self::ModelIndex => "modelindex",
            Self::MaterialIndex => "materialindex",
            Self::Vector2D => "vector2d",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
