// ==========================================
// 产线排产核心 - 工作日历
// ==========================================
// 固定周工作模式（默认周一至周五）
// ==========================================

use chrono::{Datelike, Duration, NaiveDate, Weekday};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkCalendar {
    working_days: [bool; 7], // 下标: num_days_from_monday
}

impl WorkCalendar {
    /// 由工作日集合构建；空集合退回周一至周五
    pub fn new(weekdays: &[Weekday]) -> Self {
        let mut working_days = [false; 7];
        for day in weekdays {
            working_days[day.num_days_from_monday() as usize] = true;
        }
        if !working_days.iter().any(|d| *d) {
            return Self::five_day_week();
        }
        Self { working_days }
    }

    pub fn five_day_week() -> Self {
        Self {
            working_days: [true, true, true, true, true, false, false],
        }
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.working_days[date.weekday().num_days_from_monday() as usize]
    }

    /// 当天或之后的第一个工作日
    pub fn roll_forward(&self, date: NaiveDate) -> NaiveDate {
        let mut day = date;
        while !self.is_working_day(day) {
            day += Duration::days(1);
        }
        day
    }

    /// 严格之后的下一个工作日
    pub fn next_working_day(&self, date: NaiveDate) -> NaiveDate {
        self.roll_forward(date + Duration::days(1))
    }

    /// 日期 + 缓冲天数（自然日），再顺延至工作日
    pub fn add_buffer(&self, date: NaiveDate, buffer_days: i64) -> NaiveDate {
        self.roll_forward(date + Duration::days(buffer_days))
    }
}

impl Default for WorkCalendar {
    fn default() -> Self {
        Self::five_day_week()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_roll_forward_skips_weekend() {
        let cal = WorkCalendar::five_day_week();
        // 2026-03-07 周六
        assert_eq!(cal.roll_forward(d(2026, 3, 7)), d(2026, 3, 9));
        assert_eq!(cal.roll_forward(d(2026, 3, 9)), d(2026, 3, 9));
        assert_eq!(cal.next_working_day(d(2026, 3, 6)), d(2026, 3, 9));
    }

    #[test]
    fn test_add_buffer_lands_on_working_day() {
        let cal = WorkCalendar::five_day_week();
        // 周四 + 2 = 周六 → 周一
        assert_eq!(cal.add_buffer(d(2026, 3, 5), 2), d(2026, 3, 9));
        assert_eq!(cal.add_buffer(d(2026, 3, 2), 2), d(2026, 3, 4));
    }

    #[test]
    fn test_custom_pattern() {
        let cal = WorkCalendar::new(&[Weekday::Sat]);
        assert!(cal.is_working_day(d(2026, 3, 7)));
        assert!(!cal.is_working_day(d(2026, 3, 9)));
    }
}
