use core::fmt;
use std::borrow::Cow;
use std::error::Error;

/// `CoreError` 是端点核心对外暴露的统一错误形态。
///
/// # 设计背景（Why）
/// - 端点在连接、重试、分发与熔断各阶段产生的故障需要合流为稳定错误码，
///   供日志、事件总线与上层路由器执行自动化处置（换端点重试、告警聚合）。
/// - 错误码 `code` 始终为 `'static` 字符串并遵循 `<域>.<语义>` 约定，
///   `message` 面向排障人员，`cause` 保留底层根因链路。
///
/// # 契约说明（What）
/// - **前置条件**：调用方必须使用 [`codes`] 模块内备案的码值，或遵循同一约定自定义；
/// - **返回值**：构造函数返回拥有所有权的 `CoreError`，`Send + Sync + 'static`，
///   可安全跨线程移动并塞入事件的 `cause` 字段；
/// - **后置条件**：除非显式调用 `with_*` 方法，错误不含分类与根因。
///
/// # 设计取舍（Trade-offs）
/// - `message` 使用 `Cow<'static, str>`：绝大多数错误描述为静态文案，零分配；
///   动态描述（附带地址、耗时）只在真正发生故障的慢路径上产生一次堆分配。
#[derive(Debug)]
pub struct CoreError {
    code: &'static str,
    message: Cow<'static, str>,
    category: Option<ErrorCategory>,
    cause: Option<ErrorCause>,
}

/// 根因的统一装箱形态，保持对象安全并支持 `source()` 链路遍历。
pub type ErrorCause = Box<dyn Error + Send + Sync + 'static>;

impl CoreError {
    /// 构造核心错误。
    ///
    /// # 契约定义（What）
    /// - `code`：稳定错误码，见 [`codes`]；
    /// - `message`：面向排障人员的描述，不应包含敏感信息；
    /// - **后置条件**：返回值不含分类与根因，可继续以 Builder 风格叠加。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            category: None,
            cause: None,
        }
    }

    /// 附带底层根因并返回新的错误。
    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 附带已装箱的根因，便于在错误链间转移所有权。
    pub fn with_boxed_cause(mut self, cause: ErrorCause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// 显式标记错误分类，覆盖按错误码推导的默认值。
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 获取描述。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 获取底层根因。
    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }

    /// 获取结构化错误分类。
    ///
    /// # 返回契约
    /// - 若未显式设置，按错误码前缀查 [`codes`] 的默认映射；
    /// - 未命中映射时回退为 [`ErrorCategory::Protocol`]，提示调用方补充备案。
    pub fn category(&self) -> ErrorCategory {
        self.category
            .unwrap_or_else(|| codes::default_category(self.code))
    }

    /// 判断该错误是否应计入熔断器的失败样本。
    ///
    /// # 语义说明（What）
    /// - 传输故障、超时与协议级可重试失败指向服务端健康问题，计为失败；
    /// - 配置错误、取消与熔断拒绝不反映对端健康，不计入样本。
    pub fn counts_as_breaker_failure(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transport | ErrorCategory::Timeout | ErrorCategory::Protocol
        )
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|boxed| boxed.as_ref() as &(dyn Error + 'static))
    }
}

/// 错误分类，对应端点核心的故障处置矩阵。
///
/// # 契约说明（What）
/// - `Configuration`：构造期参数非法，同步抛给调用方，不进入事件总线；
/// - `Transport`：连接失败、通道关闭等瞬态故障，由重连环吸收并以 Warn 事件上报；
/// - `Protocol`：编解码器产出的按请求失败，计入熔断样本；
/// - `Timeout`：请求级或连接尝试级超时；
/// - `EndpointUnavailable`：熔断打开或状态机不在可分发态时对 `send` 的同步拒绝；
/// - `RequestCancelled`：取消，终态，不再重试。
///
/// 端点层没有致命错误：任何分类都不会终止端点，只有显式 `disconnect` 会。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    Configuration,
    Transport,
    Protocol,
    Timeout,
    EndpointUnavailable,
    RequestCancelled,
}

/// 稳定错误码备案表。
///
/// 命名遵循 `<域>.<语义>`，新增码值需同步更新 [`default_category`] 的映射。
pub mod codes {
    use super::ErrorCategory;

    /// 非法主机名或端口。
    pub const CONFIG_INVALID_REMOTE: &str = "config.invalid_remote";
    /// 未识别的服务类别。
    pub const CONFIG_UNKNOWN_SERVICE: &str = "config.unknown_service";
    /// 环境装配失败（运行时构建、能力缺失）。
    pub const CONFIG_ENVIRONMENT: &str = "config.environment";

    /// 单次连接尝试失败。
    pub const TRANSPORT_CONNECT_FAILED: &str = "transport.connect_failed";
    /// 单次连接尝试超出 `connect_timeout`。
    pub const TRANSPORT_CONNECT_TIMEOUT: &str = "transport.connect_timeout";
    /// 通道在请求在途时关闭。
    pub const TRANSPORT_CHANNEL_CLOSED: &str = "transport.channel_closed";
    /// 关闭通道失败。
    pub const TRANSPORT_CLOSE_FAILED: &str = "transport.close_failed";

    /// 编解码器标记的服务端可重试失败。
    pub const PROTOCOL_SERVER_FAILURE: &str = "protocol.server_failure";

    /// 请求超过截止时间。
    pub const REQUEST_TIMED_OUT: &str = "request.timed_out";
    /// 经由上下文发起的取消。
    pub const REQUEST_CANCELLED: &str = "request.cancelled";

    /// 状态机或熔断器拒绝分发。
    pub const ENDPOINT_NOT_AVAILABLE: &str = "endpoint.not_available";

    /// 按错误码前缀推导默认分类。
    pub fn default_category(code: &'static str) -> ErrorCategory {
        match code {
            CONFIG_INVALID_REMOTE | CONFIG_UNKNOWN_SERVICE | CONFIG_ENVIRONMENT => {
                ErrorCategory::Configuration
            }
            TRANSPORT_CONNECT_TIMEOUT | REQUEST_TIMED_OUT => ErrorCategory::Timeout,
            TRANSPORT_CONNECT_FAILED | TRANSPORT_CHANNEL_CLOSED | TRANSPORT_CLOSE_FAILED => {
                ErrorCategory::Transport
            }
            ENDPOINT_NOT_AVAILABLE => ErrorCategory::EndpointUnavailable,
            REQUEST_CANCELLED => ErrorCategory::RequestCancelled,
            _ => ErrorCategory::Protocol,
        }
    }
}
