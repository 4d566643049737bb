use core::fmt;

/// 远端服务类别：一个端点终生只服务一个类别的套接字。
///
/// # 设计背景（Why）
/// - 集群把键值、查询、搜索等能力暴露在不同端口上，端点身份的一部分即是
///   其面向的服务类别；
/// - 类别同时决定管线形态：键值走二进制协议，其余走 HTTP 分块协议，
///   空闲看门狗（`idle_http_timeout`）只对后者生效。
///
/// # 契约说明（What）
/// - 枚举为穷举集合且实现 `Copy`，可安全嵌入上下文快照与事件导出；
/// - `as_str` 返回稳定小写标识，用于日志字段与 `export_as_map` 的取值。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Kv,
    Query,
    Search,
    Analytics,
    Views,
    Eventing,
    Management,
}

impl ServiceKind {
    /// 稳定小写标识，供日志与上下文导出使用。
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Kv => "kv",
            ServiceKind::Query => "query",
            ServiceKind::Search => "search",
            ServiceKind::Analytics => "analytics",
            ServiceKind::Views => "views",
            ServiceKind::Eventing => "eventing",
            ServiceKind::Management => "management",
        }
    }

    /// 该服务是否运行在 HTTP 分块协议之上。
    ///
    /// 键值服务使用二进制协议并依赖应用层心跳；其余服务复用 HTTP 通道，
    /// 需要空闲看门狗在 `idle_http_timeout` 后主动回收连接。
    pub fn is_http(&self) -> bool {
        !matches!(self, ServiceKind::Kv)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
