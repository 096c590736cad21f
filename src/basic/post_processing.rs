//! Markdown tables of solved bus, branch and fault quantities.
mod res_display;

use res_display::*;
use tabled::{Table, settings::Style};

use super::error::Result;
use super::network::NetworkModel;
use super::powerflow::branch_flows;
use super::shortcircuit::FaultStudyResult;

/// Rendering of solved state for presentation.
pub trait PostProcessing {
    /// Bus voltages and injections as a markdown table.
    fn bus_table(&self) -> String;

    /// Branch flows and losses as a markdown table.
    fn line_table(&self) -> Result<String>;

    fn print_res_bus(&self) {
        println!("{}", self.bus_table());
    }

    fn print_res_line(&self) -> Result<()> {
        println!("{}", self.line_table()?);
        Ok(())
    }
}

impl PostProcessing for NetworkModel {
    fn bus_table(&self) -> String {
        let s_base = self.s_base_mva;
        let rows = self.buses().iter().map(|bus| BusResTable {
            Bus: bus.id.clone(),
            Type: bus.bus_type.to_string(),
            Vm: FloatWrapper::new(bus.v, 3),
            Va: FloatWrapper::new(bus.theta.to_degrees(), 3),
            P_mw: FloatWrapper::new(bus.p * s_base, 5),
            Q_mvar: FloatWrapper::new(bus.q * s_base, 5),
        });
        Table::new(rows).with(Style::markdown()).to_string()
    }

    fn line_table(&self) -> Result<String> {
        let s_base = self.s_base_mva;
        let rows: Vec<LineResTable> = branch_flows(self)?
            .into_iter()
            .map(|flow| {
                let loss = flow.loss();
                LineResTable {
                    id: flow.branch_id,
                    from: flow.from_bus,
                    to: flow.to_bus,
                    p_from_mw: FloatWrapper::new(flow.s_from.re * s_base, 3),
                    q_from_mvar: FloatWrapper::new(flow.s_from.im * s_base, 3),
                    p_to_mw: FloatWrapper::new(flow.s_to.re * s_base, 3),
                    q_to_mvar: FloatWrapper::new(flow.s_to.im * s_base, 3),
                    pl_mw: FloatWrapper::new(loss.re * s_base, 3),
                    ql_mvar: FloatWrapper::new(loss.im * s_base, 3),
                }
            })
            .collect();
        Ok(Table::new(rows).with(Style::markdown()).to_string())
    }
}

impl FaultStudyResult {
    /// Post-fault phase voltage and current magnitudes per bus.
    pub fn table(&self) -> String {
        let rows = self.buses.iter().map(|bus| FaultResTable {
            Bus: bus.bus_id.clone(),
            Va: FloatWrapper::new(bus.v_abc[0].norm(), 4),
            Vb: FloatWrapper::new(bus.v_abc[1].norm(), 4),
            Vc: FloatWrapper::new(bus.v_abc[2].norm(), 4),
            Ia: FloatWrapper::new(bus.i_abc[0].norm(), 4),
            Ib: FloatWrapper::new(bus.i_abc[1].norm(), 4),
            Ic: FloatWrapper::new(bus.i_abc[2].norm(), 4),
        });
        Table::new(rows).with(Style::markdown()).to_string()
    }

    pub fn print(&self) {
        println!("{}", self.table());
    }
}
