use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpGeoError {
    InvalidAddress(String),
    Decode(String),
    CorruptHeader(String),
    InvalidArchive(String),
    NotReady(String),
    ServiceUnavailable(String),
    Network(String),
    FileOperation(String),
    Config(String),
    Serialization(String),
}

impl IpGeoError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            IpGeoError::InvalidAddress(_) => "E001",
            IpGeoError::Decode(_) => "E002",
            IpGeoError::CorruptHeader(_) => "E003",
            IpGeoError::InvalidArchive(_) => "E004",
            IpGeoError::NotReady(_) => "E005",
            IpGeoError::ServiceUnavailable(_) => "E006",
            IpGeoError::Network(_) => "E007",
            IpGeoError::FileOperation(_) => "E008",
            IpGeoError::Config(_) => "E009",
            IpGeoError::Serialization(_) => "E010",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            IpGeoError::InvalidAddress(_) => "Invalid Address",
            IpGeoError::Decode(_) => "Record Decode Error",
            IpGeoError::CorruptHeader(_) => "Corrupt Database Header",
            IpGeoError::InvalidArchive(_) => "Invalid Archive",
            IpGeoError::NotReady(_) => "Database Not Ready",
            IpGeoError::ServiceUnavailable(_) => "Service Unavailable",
            IpGeoError::Network(_) => "Network Error",
            IpGeoError::FileOperation(_) => "File Operation Error",
            IpGeoError::Config(_) => "Configuration Error",
            IpGeoError::Serialization(_) => "Serialization Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            IpGeoError::InvalidAddress(msg) => msg,
            IpGeoError::Decode(msg) => msg,
            IpGeoError::CorruptHeader(msg) => msg,
            IpGeoError::InvalidArchive(msg) => msg,
            IpGeoError::NotReady(msg) => msg,
            IpGeoError::ServiceUnavailable(msg) => msg,
            IpGeoError::Network(msg) => msg,
            IpGeoError::FileOperation(msg) => msg,
            IpGeoError::Config(msg) => msg,
            IpGeoError::Serialization(msg) => msg,
        }
    }

    /// 错误是否由客户端输入导致（用于 HTTP 状态码映射）
    pub fn is_client_error(&self) -> bool {
        matches!(self, IpGeoError::InvalidAddress(_) | IpGeoError::Decode(_))
    }

    /// 数据库尚未就绪（HTTP 503）
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            IpGeoError::NotReady(_) | IpGeoError::ServiceUnavailable(_)
        )
    }

    /// 格式化为彩色输出（用于 Server 模式）
    #[cfg(feature = "server")]
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于 CLI 模式）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for IpGeoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for IpGeoError {}

// 便捷的构造函数
impl IpGeoError {
    pub fn invalid_address<T: Into<String>>(msg: T) -> Self {
        IpGeoError::InvalidAddress(msg.into())
    }

    pub fn decode<T: Into<String>>(msg: T) -> Self {
        IpGeoError::Decode(msg.into())
    }

    pub fn corrupt_header<T: Into<String>>(msg: T) -> Self {
        IpGeoError::CorruptHeader(msg.into())
    }

    pub fn invalid_archive<T: Into<String>>(msg: T) -> Self {
        IpGeoError::InvalidArchive(msg.into())
    }

    pub fn not_ready<T: Into<String>>(msg: T) -> Self {
        IpGeoError::NotReady(msg.into())
    }

    pub fn service_unavailable<T: Into<String>>(msg: T) -> Self {
        IpGeoError::ServiceUnavailable(msg.into())
    }

    pub fn network<T: Into<String>>(msg: T) -> Self {
        IpGeoError::Network(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        IpGeoError::FileOperation(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        IpGeoError::Config(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        IpGeoError::Serialization(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<std::io::Error> for IpGeoError {
    fn from(err: std::io::Error) -> Self {
        IpGeoError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for IpGeoError {
    fn from(err: serde_json::Error) -> Self {
        IpGeoError::Serialization(err.to_string())
    }
}

impl From<zip::result::ZipError> for IpGeoError {
    fn from(err: zip::result::ZipError) -> Self {
        IpGeoError::InvalidArchive(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IpGeoError>;
