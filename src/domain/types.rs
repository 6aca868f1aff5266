// ==========================================
// 产线排产核心 - 领域状态枚举
// ==========================================
// 状态集合在启动时即为封闭枚举，不按文本描述逐次查询
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 为状态枚举生成 as_str / Display / FromStr / SQLite 文本映射
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// 数据库文本值
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// 全部取值（按声明顺序）
            pub fn all() -> &'static [$name] {
                &[$($name::$variant,)+]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("未知的{}取值: {}", stringify!($name), other)),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse::<$name>()
                    .map_err(|e| FromSqlError::Other(e.into()))
            }
        }
    };
}

// ==========================================
// 生产订单状态
// ==========================================
// 流转: WAITING_MATERIALS ⇄ READY → PLANNED → IN_PROGRESS → FINISHED
//       任意非终态 → CANCELLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductionOrderStatus {
    WaitingMaterials, // 待料
    Ready,            // 物料齐套
    Planned,          // 已排产
    InProgress,       // 生产中
    Finished,         // 已完工
    Cancelled,        // 已取消
}

text_enum!(ProductionOrderStatus {
    WaitingMaterials => "WAITING_MATERIALS",
    Ready => "READY",
    Planned => "PLANNED",
    InProgress => "IN_PROGRESS",
    Finished => "FINISHED",
    Cancelled => "CANCELLED",
});

impl ProductionOrderStatus {
    /// 是否终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProductionOrderStatus::Finished | ProductionOrderStatus::Cancelled
        )
    }

    /// 是否允许执行物料预留（首次或重新评估）
    pub fn accepts_material_reservation(&self) -> bool {
        matches!(
            self,
            ProductionOrderStatus::WaitingMaterials | ProductionOrderStatus::Ready
        )
    }

    /// 是否可完工结算
    pub fn can_finish(&self) -> bool {
        !self.is_terminal()
    }
}

// ==========================================
// 原料批次状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotStatus {
    Available,  // 可用
    Depleted,   // 已耗尽
    Quarantine, // 质量冻结
}

text_enum!(LotStatus {
    Available => "AVAILABLE",
    Depleted => "DEPLETED",
    Quarantine => "QUARANTINE",
});

// ==========================================
// 物料预留状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Active,    // 生效
    Cancelled, // 已作废
    Consumed,  // 已消耗
}

text_enum!(ReservationStatus {
    Active => "ACTIVE",
    Cancelled => "CANCELLED",
    Consumed => "CONSUMED",
});

// ==========================================
// 工单状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderStatus {
    Pending,    // 待开工
    InProgress, // 执行中
    Completed,  // 已完成
    Cancelled,  // 已取消
}

text_enum!(WorkOrderStatus {
    Pending => "PENDING",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

impl WorkOrderStatus {
    /// 已投产（不可再被重排挪动）的工单
    pub fn is_committed(&self) -> bool {
        matches!(self, WorkOrderStatus::InProgress | WorkOrderStatus::Completed)
    }
}

// ==========================================
// 销售订单状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalesOrderStatus {
    Open,      // 正常
    AtRisk,    // 交期风险
    Delivered, // 已交付
    Cancelled, // 已取消
}

text_enum!(SalesOrderStatus {
    Open => "OPEN",
    AtRisk => "AT_RISK",
    Delivered => "DELIVERED",
    Cancelled => "CANCELLED",
});

// ==========================================
// 采购申请状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseRequestStatus {
    Open,      // 待处理
    Cancelled, // 已作废（订单重新评估）
}

text_enum!(PurchaseRequestStatus {
    Open => "OPEN",
    Cancelled => "CANCELLED",
});

// ==========================================
// 审计动作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    OrderCreated,
    MaterialReservation,
    MaterialArrival,
    LotQuarantine,
    OrderFinalization,
    OrderCancelled,
    Schedule,
    Replan,
    WorkOrderEvent,
}

text_enum!(AuditAction {
    OrderCreated => "ORDER_CREATED",
    MaterialReservation => "MATERIAL_RESERVATION",
    MaterialArrival => "MATERIAL_ARRIVAL",
    LotQuarantine => "LOT_QUARANTINE",
    OrderFinalization => "ORDER_FINALIZATION",
    OrderCancelled => "ORDER_CANCELLED",
    Schedule => "SCHEDULE",
    Replan => "REPLAN",
    WorkOrderEvent => "WORK_ORDER_EVENT",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_roundtrip_is_case_insensitive() {
        assert_eq!(
            "waiting_materials".parse::<ProductionOrderStatus>().unwrap(),
            ProductionOrderStatus::WaitingMaterials
        );
        assert_eq!(LotStatus::Quarantine.to_string(), "QUARANTINE");
        assert!("UNKNOWN".parse::<ReservationStatus>().is_err());
    }

    #[test]
    fn test_order_status_rules() {
        assert!(ProductionOrderStatus::Finished.is_terminal());
        assert!(ProductionOrderStatus::Ready.accepts_material_reservation());
        assert!(!ProductionOrderStatus::Planned.accepts_material_reservation());
        assert!(WorkOrderStatus::Completed.is_committed());
        assert!(!WorkOrderStatus::Pending.is_committed());
    }

    #[test]
    fn test_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&SalesOrderStatus::AtRisk).unwrap();
        assert_eq!(json, "\"AT_RISK\"");
    }
}
